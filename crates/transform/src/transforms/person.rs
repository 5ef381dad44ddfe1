use crate::consts::{UNKNOWN, is_valid_email};
use crate::context::TransformContext;
use crate::draft::{Content, Draft};
use crate::error::Result;
use crate::registry::Transform;
use crate::result::TransformResult;
use async_trait::async_trait;
use decant_gateway::models::Story;
use serde_json::{Map, Value};

/// People: staff and external contributors.
///
/// Whether someone is internal is decided by the configured marker appearing
/// in `email`. External people whose `email` isn't an address at all had
/// their organisation typed into it, so the raw value becomes `company`.
/// Only internal people carry an `employeeId`.
pub struct PersonTransform;

#[async_trait]
impl Transform for PersonTransform {
    fn content_type(&self) -> &'static str {
        "person"
    }

    fn document_type(&self) -> &'static str {
        "person"
    }

    async fn transform(&self, story: &Story, ctx: &TransformContext) -> Result<TransformResult> {
        let content = Content::of(story);
        let mut draft = Draft::new(story, self.document_type())?;
        let options = ctx.options();

        let name = match draft.optional_text(&content, "name") {
            Some(name) => name,
            None => {
                let fallback = Some(story.name.trim()).filter(|n| !n.is_empty()).unwrap_or(&draft.natural_key).to_string();
                draft.warn("name", format!("missing, using \"{fallback}\""));
                fallback
            },
        };
        draft.set("name", name);

        let role = draft.required_text(&content, "role", UNKNOWN);
        let translated = match ctx.translations(self.document_type()).get(&draft.natural_key, "role") {
            Some(translated) => translated.to_string(),
            None => {
                draft.warn("role", format!("no \"{}\" translation, reusing \"{role}\"", options.secondary_locale));
                role.clone()
            },
        };
        let mut localized = Map::new();
        localized.insert(options.primary_locale.clone(), Value::String(role));
        localized.insert(options.secondary_locale.clone(), Value::String(translated));
        draft.set("role", localized);

        let email = draft.optional_text(&content, "email");
        let marker = options.internal_email_marker.trim().to_lowercase();
        let internal = !marker.is_empty() && email.as_deref().is_some_and(|e| e.to_lowercase().contains(&marker));
        draft.set("externalPerson", !internal);
        match email {
            Some(email) if internal || is_valid_email(&email) => draft.set("email", email),
            Some(company) => draft.set("company", company),
            None => draft.warn("email", "missing, treated as external"),
        }
        if internal {
            match draft.optional_identifier(&content, "employee_id") {
                Some(employee_id) => draft.set("employeeId", employee_id),
                None => draft.warn("employee_id", "internal person without an employee id"),
            }
        }

        if let Some(image) = draft.optional_asset(&content, "image") {
            draft.attach_asset("image", image);
        }
        draft.finish(ctx).await
    }
}
