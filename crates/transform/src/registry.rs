use crate::context::TransformContext;
use crate::error::{ErrorKind, Result};
use crate::result::TransformResult;
use crate::transforms::{ArticleTransform, PageTransform, PersonTransform};
use async_trait::async_trait;
use decant_gateway::models::Story;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Mapping of one content type into its destination document.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Story category this transform handles.
    fn content_type(&self) -> &'static str;

    /// `_type` of the produced documents; also names the identity map.
    fn document_type(&self) -> &'static str;

    async fn transform(&self, story: &Story, ctx: &TransformContext) -> Result<TransformResult>;
}

/// Dispatch table from story category to [`Transform`].
#[derive(Clone)]
pub struct Registry {
    transforms: HashMap<&'static str, Arc<dyn Transform>>,
}
impl Registry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Replaces any transform already registered for the same content type.
    pub fn register(&mut self, transform: impl Transform + 'static) -> &mut Self {
        self.transforms.insert(transform.content_type(), Arc::new(transform));
        self
    }

    pub fn get(&self, content_type: &str) -> Option<&Arc<dyn Transform>> {
        self.transforms.get(content_type)
    }

    /// Destination document types of every registered transform.
    pub fn document_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.transforms.values().map(|t| t.document_type())
    }

    /// Transform a story with whatever is registered for its category.
    ///
    /// Unregistered categories are [`UnsupportedContentType`](ErrorKind::UnsupportedContentType).
    #[instrument(level = "debug", skip(self, story, ctx), fields(id = story.id, category = story.category()))]
    pub async fn transform(&self, story: &Story, ctx: &TransformContext) -> Result<TransformResult> {
        let Some(transform) = self.get(story.category()) else {
            exn::bail!(ErrorKind::UnsupportedContentType(story.category().to_string()));
        };
        transform.transform(story, ctx).await
    }
}
impl Default for Registry {
    /// Person, article and page.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(PersonTransform).register(ArticleTransform).register(PageTransform);
        registry
    }
}
