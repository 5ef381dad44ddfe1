use crate::consts::UNTITLED;
use crate::context::TransformContext;
use crate::draft::{Content, Draft};
use crate::error::Result;
use crate::registry::Transform;
use crate::result::TransformResult;
use async_trait::async_trait;
use decant_gateway::models::Story;
use serde_json::Value;

/// Generic pages built from nested blocks.
pub struct PageTransform;

/// Blocks (objects naming a `component`) nested anywhere below `value`.
fn count_blocks(value: &Value) -> u64 {
    match value {
        Value::Array(items) => items.iter().map(count_blocks).sum(),
        Value::Object(map) => {
            let own = u64::from(map.get("component").is_some_and(Value::is_string));
            own + map.values().map(count_blocks).sum::<u64>()
        },
        _ => 0,
    }
}

#[async_trait]
impl Transform for PageTransform {
    fn content_type(&self) -> &'static str {
        "page"
    }

    fn document_type(&self) -> &'static str {
        "page"
    }

    async fn transform(&self, story: &Story, ctx: &TransformContext) -> Result<TransformResult> {
        let content = Content::of(story);
        let mut draft = Draft::new(story, self.document_type())?;

        let title = match draft.optional_text(&content, "title") {
            Some(title) => title,
            None if !story.name.trim().is_empty() => story.name.trim().to_string(),
            None => {
                draft.warn("title", format!("missing, using \"{UNTITLED}\""));
                UNTITLED.to_string()
            },
        };
        draft.set("title", title);

        let path = match story.full_slug.trim_matches('/') {
            "" => format!("/{}", draft.natural_key),
            full => format!("/{full}"),
        };
        draft.set("path", path);

        let seo = draft.optional_text(&content, "seo_description").or_else(|| {
            content.get("seo").and_then(|seo| seo.get("description")).and_then(Value::as_str).map(str::to_string)
        });
        if let Some(description) = seo.filter(|d| !d.trim().is_empty()) {
            draft.set("seoDescription", description);
        }

        let blocks = content.get("body").map_or(0, count_blocks);
        draft.set("blockCount", blocks);
        draft.finish(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::testing::{context, story};
    use serde_json::json;

    #[test]
    fn test_count_blocks() {
        let body = json!([
            {"component": "hero", "title": "Hi"},
            {"component": "grid", "columns": [{"component": "teaser"}, {"component": "teaser"}]},
            {"not_a_block": true}
        ]);
        assert_eq!(count_blocks(&body), 4);
        assert_eq!(count_blocks(&json!("text")), 0);
    }

    #[tokio::test]
    async fn test_page() {
        let ctx = context(None);
        let record = story(json!({
            "id": 200,
            "name": "About us",
            "slug": "about",
            "full_slug": "company/about/",
            "content": {
                "component": "page",
                "seo": {"description": "Who we are"},
                "body": [{"component": "hero"}]
            }
        }));
        let result = PageTransform.transform(&record, &ctx).await.unwrap();
        let doc = &result.document;
        assert_eq!(doc["title"], "About us");
        assert_eq!(doc["path"], "/company/about");
        assert_eq!(doc["seoDescription"], "Who we are");
        assert_eq!(doc["blockCount"], 1);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_untitled_page() {
        let ctx = context(None);
        let record = story(json!({"id": 201, "slug": "blank", "content": {"component": "page"}}));
        let result = PageTransform.transform(&record, &ctx).await.unwrap();
        assert_eq!(result.document["title"], UNTITLED);
        assert_eq!(result.document["path"], "/blank");
        assert_eq!(result.warnings.len(), 1);
    }
}
