use crate::consts::{UNKNOWN, UNTITLED};
use crate::context::TransformContext;
use crate::draft::{Content, Draft};
use crate::error::{ErrorKind, Result};
use crate::registry::Transform;
use crate::result::TransformResult;
use async_trait::async_trait;
use decant_gateway::models::Story;
use exn::ResultExt;
use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;

/// Document type the `author` field refers to.
const AUTHOR_TYPE: &str = "person";

/// News and blog articles.
pub struct ArticleTransform;

#[async_trait]
impl Transform for ArticleTransform {
    fn content_type(&self) -> &'static str {
        "article"
    }

    fn document_type(&self) -> &'static str {
        "article"
    }

    async fn transform(&self, story: &Story, ctx: &TransformContext) -> Result<TransformResult> {
        let content = Content::of(story);
        let mut draft = Draft::new(story, self.document_type())?;

        let title = draft.required_text(&content, "title", UNTITLED);
        draft.set("title", title);
        let category = draft.required_text(&content, "category", UNKNOWN);
        draft.set("category", category);

        match content.get("body") {
            Some(body @ (Value::String(_) | Value::Object(_) | Value::Array(_))) => draft.set("body", body.clone()),
            Some(_) => {
                draft.warn("body", "neither text nor rich text, left empty");
                draft.set("body", "");
            },
            None => {
                draft.warn("body", "missing, left empty");
                draft.set("body", "");
            },
        }

        // Authors are people; their ids come from the person table so the
        // reference holds whether or not the person was transformed first.
        if let Some(author) = draft.optional_text(&content, "author") {
            let author_id = ctx.identity(AUTHOR_TYPE).id_for(&author).await.or_raise(|| ErrorKind::Identity)?;
            draft.set("author", json!({"_type": "reference", "_ref": author_id}));
        }

        match story.published_at.or(story.created_at).map(|at| at.format(&Rfc3339)) {
            Some(Ok(published)) => draft.set("publishedAt", published),
            Some(Err(e)) => draft.warn("published_at", format!("unrepresentable timestamp: {e}")),
            None => draft.warn("published_at", "never published, no date set"),
        }

        if let Some(image) = draft.optional_asset(&content, "image") {
            draft.attach_asset("heroImage", image);
        }
        draft.finish(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::testing::{context, story};

    #[tokio::test]
    async fn test_article() {
        let ctx = context(None);
        let record = story(json!({
            "id": 100,
            "slug": "hello-world",
            "published_at": "2024-03-01T10:00:00.000Z",
            "content": {
                "component": "article",
                "title": "Hello, World",
                "category": "News",
                "body": {"type": "doc", "content": []},
                "author": "jane-doe",
                "image": {"filename": "https://a.example.com/f/1/hero.jpg"}
            }
        }));
        let result = ArticleTransform.transform(&record, &ctx).await.unwrap();
        let doc = &result.document;
        assert_eq!(doc["title"], "Hello, World");
        assert_eq!(doc["category"], "News");
        assert_eq!(doc["publishedAt"], "2024-03-01T10:00:00Z");
        assert_eq!(doc["body"]["type"], "doc");
        assert_eq!(result.artifacts.len(), 1);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);

        // The author reference matches the id the person gets.
        let person_id = ctx.identity("person").id_for("jane-doe").await.unwrap();
        assert_eq!(doc["author"]["_ref"], person_id.as_str());
    }

    #[tokio::test]
    async fn test_fallbacks() {
        let ctx = context(None);
        let record = story(json!({"id": 101, "slug": "draft", "content": {"component": "article"}}));
        let result = ArticleTransform.transform(&record, &ctx).await.unwrap();
        assert_eq!(result.document["title"], UNTITLED);
        assert_eq!(result.document["category"], UNKNOWN);
        assert_eq!(result.document["body"], "");
        assert!(result.document.get("author").is_none());
        let fields: Vec<&str> = result.warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "category", "body", "published_at"]);
    }
}
