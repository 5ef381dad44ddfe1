//! Source stories → destination documents.
//!
//! A [`Registry`] dispatches each story on its category to a [`Transform`],
//! which reads its own view of the freeform content and builds a document
//! with `_id` (from the run's identity maps) and `_type`. Problems with
//! individual fields never fail a transform: they become [`DataWarning`]s and
//! a fallback value. Only a story without a natural key (slug) is an error.
//!
//! ```no_run
//! use decant_transform::{Registry, TransformContext, TransformOptions};
//! # use decant_gateway::models::Story;
//! # async fn example(backend: decant_storage::BackendHandle, story: Story) -> decant_transform::error::Result<()> {
//! let ctx = TransformContext::new(backend, TransformOptions::default());
//! let result = Registry::default().transform(&story, &ctx).await?;
//! for warning in &result.warnings {
//!     eprintln!("{warning}");
//! }
//! # Ok(())
//! # }
//! ```

mod consts;
mod context;
mod draft;
pub mod error;
mod registry;
mod result;
mod transforms;
mod warning;

pub use crate::consts::{UNKNOWN, UNTITLED};
pub use crate::context::{TransformContext, TransformOptions};
pub use crate::registry::{Registry, Transform};
pub use crate::result::{SideArtifact, TransformResult};
pub use crate::transforms::{ArticleTransform, PageTransform, PersonTransform};
pub use crate::warning::DataWarning;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::testing::{context, story};
    use serde_json::json;

    #[tokio::test]
    async fn test_registry_dispatch() {
        let ctx = context(None);
        let registry = Registry::default();
        let page = story(json!({"id": 1, "slug": "home", "content": {"component": "page", "title": "Home"}}));
        let result = registry.transform(&page, &ctx).await.unwrap();
        assert_eq!(result.document_type(), Some("page"));
        assert_eq!(result.category, "page");
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let ctx = context(None);
        let record = story(json!({"id": 2, "slug": "x", "content": {"component": "carousel"}}));
        let err = Registry::default().transform(&record, &ctx).await.unwrap_err();
        assert!(matches!(&*err, error::ErrorKind::UnsupportedContentType(t) if t == "carousel"));
        assert!(err.is_skippable());
    }

    #[test]
    fn test_document_types() {
        let mut types: Vec<_> = Registry::default().document_types().collect();
        types.sort_unstable();
        assert_eq!(types, vec!["article", "page", "person"]);
    }
}
