//! REST response shapes for items, bundles and bitstreams.
//!
//! Only the fields the exporter reads are modelled; serde ignores the rest of
//! the HAL document.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::record::{BitstreamRef, ObjectUuid, RecordId};

/// Item metadata fetched for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// The handle that was looked up.
    pub id: RecordId,
    /// Repository UUID of the item.
    pub item: ObjectUuid,
    /// Metadata values keyed by qualified field name (`dc.title`), in place order.
    pub fields: BTreeMap<String, Vec<String>>,
}

impl RecordMetadata {
    /// All values of one field, empty when absent.
    #[must_use]
    pub fn values(&self, field: &str) -> &[String] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemResponse {
    pub(crate) uuid: String,
    #[serde(default)]
    pub(crate) metadata: BTreeMap<String, Vec<MetadataValue>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetadataValue {
    pub(crate) value: Option<String>,
    #[serde(default)]
    pub(crate) place: i64,
}

impl ItemResponse {
    /// Flattens the metadata map, ordering each field's values by `place`.
    pub(crate) fn into_fields(self) -> BTreeMap<String, Vec<String>> {
        self.metadata
            .into_iter()
            .map(|(field, mut values)| {
                values.sort_by_key(|value| value.place);
                let values = values.into_iter().filter_map(|value| value.value).collect();
                (field, values)
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BundlePage {
    #[serde(rename = "_embedded", default)]
    pub(crate) embedded: BundleList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BundleList {
    #[serde(default)]
    pub(crate) bundles: Vec<BundleResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BundleResponse {
    pub(crate) uuid: String,
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BitstreamPage {
    #[serde(rename = "_embedded", default)]
    pub(crate) embedded: BitstreamList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BitstreamList {
    #[serde(default)]
    pub(crate) bitstreams: Vec<BitstreamResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BitstreamResponse {
    pub(crate) uuid: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(rename = "sizeBytes", default)]
    pub(crate) size_bytes: Option<u64>,
}

/// A downloadable PDF in a record's ORIGINAL bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitstreamCandidate {
    /// Validated bitstream id.
    pub reference: BitstreamRef,
    /// File name as stored in the repository.
    pub name: String,
    /// Size the repository reports, if any.
    pub size_bytes: Option<u64>,
    /// Bundle the bitstream belongs to.
    pub bundle_name: String,
}

/// True when a bitstream name looks like a PDF.
pub(crate) fn is_pdf_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}
