use decant_identity::IdentityMap;
use decant_staging::Translations;
use decant_storage::BackendHandle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Substring of `email` that marks a person as internal.
    pub internal_email_marker: String,
    /// Locale label of the source's own values.
    pub primary_locale: String,
    /// Locale label of the side-loaded translations.
    pub secondary_locale: String,
}
impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            internal_email_marker: "@example.com".to_string(),
            primary_locale: "en".to_string(),
            secondary_locale: "de".to_string(),
        }
    }
}

/// Everything a transform may consult, built once per run and passed
/// explicitly.
///
/// Identity maps are opened on demand, one per destination document type
/// (`id-maps/<type>-ids.json`), and shared for the whole run. Translations
/// are loaded up front by whoever builds the context.
pub struct TransformContext {
    backend: BackendHandle,
    identities: Mutex<HashMap<String, Arc<IdentityMap>>>,
    translations: HashMap<String, Translations>,
    options: TransformOptions,
}
impl TransformContext {
    pub fn new(backend: BackendHandle, options: TransformOptions) -> Self {
        Self {
            backend,
            identities: Mutex::new(HashMap::new()),
            translations: HashMap::new(),
            options,
        }
    }

    pub fn with_translations(mut self, document_type: impl Into<String>, translations: Translations) -> Self {
        self.translations.insert(document_type.into(), translations);
        self
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// The identity map for a destination document type.
    pub fn identity(&self, document_type: &str) -> Arc<IdentityMap> {
        let mut identities = self.identities.lock().unwrap_or_else(PoisonError::into_inner);
        identities
            .entry(document_type.to_string())
            .or_insert_with(|| Arc::new(IdentityMap::new(self.backend.clone(), document_type)))
            .clone()
    }

    /// Translations for a document type; empty when none were loaded.
    pub fn translations(&self, document_type: &str) -> &Translations {
        static EMPTY: std::sync::LazyLock<Translations> = std::sync::LazyLock::new(Translations::default);
        self.translations.get(document_type).unwrap_or(&EMPTY)
    }
}
