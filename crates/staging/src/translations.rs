use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Secondary-locale field values, keyed by natural key then field name.
///
/// Loaded once per run from `translations/<kind>-translations.json`:
///
/// ```json
/// { "jane-doe": { "role": "Technische Direktorin" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Translations(HashMap<String, HashMap<String, String>>);
impl Translations {
    pub fn get(&self, natural_key: &str, field: &str) -> Option<&str> {
        self.0.get(natural_key)?.get(field).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    pub fn insert(&mut self, natural_key: impl Into<String>, field: impl Into<String>, value: impl Into<String>) {
        self.0.entry(natural_key.into()).or_default().insert(field.into(), value.into());
    }

    /// Number of natural keys with at least one translated field.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let translations: Translations =
            serde_json::from_str(r#"{"jane-doe": {"role": "Technische Direktorin", "bio": " "}}"#).unwrap();
        assert_eq!(translations.get("jane-doe", "role"), Some("Technische Direktorin"));
        // Blank values count as missing.
        assert_eq!(translations.get("jane-doe", "bio"), None);
        assert_eq!(translations.get("john-doe", "role"), None);
        assert_eq!(translations.len(), 1);
    }
}
