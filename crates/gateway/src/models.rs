//! Source records as returned by the management API.
//!
//! Every model keeps the fields it doesn't know about in `extra`, so a record
//! written back to staging carries everything the API sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Partition for stories with neither a content type nor a content component.
pub const UNCATEGORIZED: &str = "_uncategorized";

/// Metadata of the source space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub stories_count: Option<u64>,
    #[serde(default)]
    pub assets_count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A content entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: u64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub full_slug: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub published_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Freeform payload; list endpoints may omit it.
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl Story {
    /// Category tag: `content_type`, falling back to `content.component`,
    /// falling back to [`UNCATEGORIZED`].
    pub fn category(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                self.content
                    .as_ref()
                    .and_then(|c| c.get("component"))
                    .and_then(Value::as_str)
                    .filter(|c| !c.trim().is_empty())
            })
            .unwrap_or(UNCATEGORIZED)
    }

    /// Whether the list endpoint left out the content payload.
    pub fn is_missing_content(&self) -> bool {
        !self.is_folder && self.content.as_ref().is_none_or(Value::is_null)
    }
}

/// A binary asset's metadata. `filename` is the download URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub copyright: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
impl Asset {
    /// Last path segment of the download URL, without query string.
    pub fn basename(&self) -> &str {
        let path = self.filename.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/').next().unwrap_or_default()
    }
}

/// A content-type schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub schema: Value,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A key/value lookup table. Entries come from a separate endpoint and are
/// stored alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datasource {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub entries: Vec<DatasourceEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasourceEntry {
    pub id: u64,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub dimension_value: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct SpaceEnvelope {
    pub space: Space,
}

#[derive(Deserialize)]
pub(crate) struct StoryEnvelope {
    pub story: Story,
}
