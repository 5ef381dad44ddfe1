use crate::warning::DataWarning;
use serde::Serialize;
use serde_json::Value;

/// Work left for the importer besides writing the document itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SideArtifact {
    /// Upload the binary at `url` and point the document's `field` at it.
    AssetUpload {
        field: String,
        url: String,
        filename: String,
        alt: Option<String>,
    },
}

/// Output of transforming one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResult {
    pub source_id: u64,
    pub category: String,
    pub natural_key: String,
    pub destination_id: String,
    /// Destination document; always carries `_id` and `_type`.
    pub document: Value,
    pub artifacts: Vec<SideArtifact>,
    pub warnings: Vec<DataWarning>,
}
impl TransformResult {
    pub fn document_type(&self) -> Option<&str> {
        self.document.get("_type").and_then(Value::as_str)
    }
}
