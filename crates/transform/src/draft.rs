//! Shared plumbing for transforms: a lenient view over the freeform content
//! payload and a document under construction that collects warnings.

use crate::context::TransformContext;
use crate::error::{ErrorKind, Result};
use crate::result::{SideArtifact, TransformResult};
use crate::warning::DataWarning;
use decant_gateway::models::Story;
use exn::ResultExt;
use serde_json::{Map, Value};

/// An asset field (`{"filename": "<url>", "alt": "..."}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AssetRef {
    pub url: String,
    pub alt: Option<String>,
}

/// Read-only view over a story's content object.
pub(crate) struct Content<'a>(Option<&'a Map<String, Value>>);
impl<'a> Content<'a> {
    pub fn of(story: &'a Story) -> Self {
        Self(story.content.as_ref().and_then(Value::as_object))
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.0?.get(key).filter(|v| !v.is_null())
    }
}

enum Lookup<T> {
    Found(T),
    Missing,
    Invalid,
}

fn text<'a>(content: &Content<'a>, key: &str) -> Lookup<&'a str> {
    match content.get(key) {
        None => Lookup::Missing,
        Some(Value::String(s)) if s.trim().is_empty() => Lookup::Missing,
        Some(Value::String(s)) => Lookup::Found(s.trim()),
        Some(_) => Lookup::Invalid,
    }
}

/// A destination document under construction.
pub(crate) struct Draft<'a> {
    pub story: &'a Story,
    pub natural_key: String,
    document_type: &'static str,
    document: Map<String, Value>,
    artifacts: Vec<SideArtifact>,
    warnings: Vec<DataWarning>,
}
impl<'a> Draft<'a> {
    /// Start a document. The natural key (slug) is the only hard
    /// requirement.
    pub fn new(story: &'a Story, document_type: &'static str) -> Result<Self> {
        let natural_key = story.slug.trim();
        if natural_key.is_empty() {
            exn::bail!(ErrorKind::MissingNaturalKey { id: story.id });
        }
        let mut draft = Self {
            story,
            natural_key: natural_key.to_string(),
            document_type,
            document: Map::new(),
            artifacts: Vec::new(),
            warnings: Vec::new(),
        };
        draft.set("_type", document_type);
        draft.set("slug", natural_key);
        draft.set("sourceId", story.id);
        if !Content::of(story).is_present() {
            draft.warn("content", "record has no content object");
        }
        Ok(draft)
    }

    pub fn warn(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(DataWarning {
            natural_key: self.natural_key.clone(),
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.document.insert(key.to_string(), value.into());
    }

    /// A text field that should be there: warns and falls back when it's
    /// missing or not text.
    pub fn required_text(&mut self, content: &Content<'_>, key: &str, fallback: &str) -> String {
        match text(content, key) {
            Lookup::Found(value) => value.to_string(),
            Lookup::Missing => {
                self.warn(key, format!("missing, using \"{fallback}\""));
                fallback.to_string()
            },
            Lookup::Invalid => {
                self.warn(key, format!("not text, using \"{fallback}\""));
                fallback.to_string()
            },
        }
    }

    /// A text field that may be absent: warns only when it's present but
    /// not text.
    pub fn optional_text(&mut self, content: &Content<'_>, key: &str) -> Option<String> {
        match text(content, key) {
            Lookup::Found(value) => Some(value.to_string()),
            Lookup::Missing => None,
            Lookup::Invalid => {
                self.warn(key, "not text, ignored");
                None
            },
        }
    }

    /// An identifier that may come as text or as a number.
    pub fn optional_identifier(&mut self, content: &Content<'_>, key: &str) -> Option<String> {
        match content.get(key) {
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => self.optional_text(content, key),
        }
    }

    /// An asset field; an object without a URL counts as absent.
    pub fn optional_asset(&mut self, content: &Content<'_>, key: &str) -> Option<AssetRef> {
        let value = content.get(key)?;
        let Some(object) = value.as_object() else {
            self.warn(key, "not an asset, ignored");
            return None;
        };
        let url = object.get("filename").and_then(Value::as_str).map(str::trim).filter(|u| !u.is_empty())?;
        let alt = object.get("alt").and_then(Value::as_str).map(str::trim).filter(|a| !a.is_empty());
        Some(AssetRef {
            url: url.to_string(),
            alt: alt.map(str::to_string),
        })
    }

    /// Queue an asset for upload and reference it from the document.
    pub fn attach_asset(&mut self, key: &str, asset: AssetRef) {
        let filename = asset.url.split(['?', '#']).next().unwrap_or_default().rsplit('/').next().unwrap_or_default();
        let mut image = Map::new();
        image.insert("_type".to_string(), "image".into());
        image.insert("sourceUrl".to_string(), asset.url.clone().into());
        if let Some(alt) = &asset.alt {
            image.insert("alt".to_string(), alt.clone().into());
        }
        self.set(key, image);
        self.artifacts.push(SideArtifact::AssetUpload {
            field: key.to_string(),
            url: asset.url.clone(),
            filename: filename.to_string(),
            alt: asset.alt,
        });
    }

    /// Assign the destination id and seal the document.
    pub async fn finish(mut self, ctx: &TransformContext) -> Result<TransformResult> {
        let destination_id =
            ctx.identity(self.document_type).id_for(&self.natural_key).await.or_raise(|| ErrorKind::Identity)?;
        self.set("_id", destination_id.clone());
        Ok(TransformResult {
            source_id: self.story.id,
            category: self.story.category().to_string(),
            natural_key: self.natural_key,
            destination_id,
            document: Value::Object(self.document),
            artifacts: self.artifacts,
            warnings: self.warnings,
        })
    }
}
