//! Ledger row shape.

use serde::{Deserialize, Serialize};

/// Ledger column headers, in order.
pub const LEDGER_HEADERS: [&str; 8] = [
    "Handle",
    "File",
    "Type",
    "Title",
    "Author",
    "DOI",
    "Publication Date",
    "Repository Record Created",
];

/// One row of `metadata.csv`.
///
/// Field order is the column order; serde renames keep the headers the
/// downstream archive already reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedRow {
    /// `http://hdl.handle.net/<prefix>/<suffix>`.
    #[serde(rename = "Handle")]
    pub handle: String,
    /// `<suffix>.pdf`.
    #[serde(rename = "File")]
    pub file_name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "DOI")]
    pub doi: String,
    #[serde(rename = "Publication Date")]
    pub publication_date: String,
    #[serde(rename = "Repository Record Created")]
    pub repository_created: String,
}
