use crate::kind::ResourceKind;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One transformed record in `mapping.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub source_id: u64,
    pub kind: ResourceKind,
    pub category: String,
    pub natural_key: String,
    pub destination_id: String,
}

/// Source → destination crosswalk written after a transform pass, so the
/// importer can resolve cross-references between documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingManifest {
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub entries: Vec<MappingEntry>,
}
impl MappingManifest {
    /// Entries are sorted by kind, then source id.
    pub fn new(generated_at: OffsetDateTime, mut entries: Vec<MappingEntry>) -> Self {
        entries.sort_by(|a, b| (a.kind, a.source_id).cmp(&(b.kind, b.source_id)));
        Self { generated_at, entries }
    }

    pub fn destination_id(&self, kind: ResourceKind, source_id: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.source_id == source_id)
            .map(|e| e.destination_id.as_str())
    }
}
