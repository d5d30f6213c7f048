//! Mapping from repository metadata to ledger rows.

use crate::source::RecordMetadata;
use crate::store::{ExportedRow, PDF_EXTENSION};

/// Separator between multiple values of one field.
pub const VALUE_SEPARATOR: &str = "; ";

pub(crate) const TYPE_FIELD: &str = "dc.type";
pub(crate) const TITLE_FIELD: &str = "dc.title";
pub(crate) const AUTHOR_FIELD: &str = "dc.contributor.author";
pub(crate) const DOI_FIELD: &str = "dc.identifier.doi";
pub(crate) const ISSUED_FIELD: &str = "dc.date.issued";
pub(crate) const ACCESSIONED_FIELD: &str = "dc.date.accessioned";

/// Collapses whitespace runs to one space and trims.
fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn joined(metadata: &RecordMetadata, field: &str) -> String {
    metadata
        .values(field)
        .iter()
        .map(|value| normalize_whitespace(value))
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(VALUE_SEPARATOR)
}

fn first(metadata: &RecordMetadata, field: &str) -> String {
    metadata
        .values(field)
        .iter()
        .map(|value| normalize_whitespace(value))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Builds the ledger row for a record.
#[must_use]
pub fn build_row(metadata: &RecordMetadata) -> ExportedRow {
    ExportedRow {
        handle: metadata.id.handle_url(),
        file_name: format!("{}.{PDF_EXTENSION}", metadata.id.suffix()),
        record_type: first(metadata, TYPE_FIELD),
        title: joined(metadata, TITLE_FIELD),
        author: joined(metadata, AUTHOR_FIELD),
        doi: joined(metadata, DOI_FIELD),
        publication_date: joined(metadata, ISSUED_FIELD),
        repository_created: joined(metadata, ACCESSIONED_FIELD),
    }
}
