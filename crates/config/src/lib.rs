//! Layered configuration for decant.
//!
//! Later layers win:
//!
//! 1. Built-in defaults.
//! 2. A config file: `decant.toml`, `decant.yaml` or `decant.json` found
//!    from the working directory upwards, or one explicit path.
//! 3. `STORYBLOK_OAUTH_TOKEN` and `STORYBLOK_SPACE_ID`.
//! 4. `DECANT_`-prefixed variables, nested with `__`
//!    (`DECANT_API__PER_PAGE=50`).
//!
//! Missing credentials are not a load error; building the gateway from
//! them is.

pub mod error;

use crate::error::{ErrorKind, Result};
use decant_gateway::{Credentials, DEFAULT_BASE_URL, GatewayOptions, RetryPolicy};
use decant_staging::ResourceKind;
use decant_sync::MigrationOptions;
use decant_transform::TransformOptions;
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "decant";
pub const ENV_PREFIX: &str = "DECANT_";
pub const TOKEN_VAR: &str = "STORYBLOK_OAUTH_TOKEN";
pub const SPACE_ID_VAR: &str = "STORYBLOK_SPACE_ID";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub transform: TransformConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub token: Option<String>,
    /// Accepts a number as well, since that's what space ids look like.
    #[serde(deserialize_with = "string_or_number")]
    pub space_id: Option<String>,
    pub base_url: String,
    pub per_page: u32,
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    /// Cap on a single backoff wait, `retry-after` included.
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
}
impl Default for ApiConfig {
    fn default() -> Self {
        let gateway = GatewayOptions::default();
        Self {
            token: None,
            space_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            per_page: gateway.per_page,
            max_attempts: gateway.retry.max_attempts,
            initial_delay_ms: gateway.retry.initial_delay.as_millis() as u64,
            max_delay_ms: gateway.retry.max_delay.as_millis() as u64,
            timeout_secs: gateway.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Migration root all staged content lives under.
    pub root: PathBuf,
}
impl Default for StorageConfig {
    fn default() -> Self {
        let root = ProjectDirs::from("", "", CONFIG_FILE_NAME)
            .map(|dirs| dirs.data_dir().join("migrations"))
            .unwrap_or_else(|| PathBuf::from("decant-data"));
        Self { root }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub force_full: bool,
    pub kinds: Vec<ResourceKind>,
}
impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            force_full: false,
            kinds: ResourceKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub internal_email_marker: String,
    pub primary_locale: String,
    pub secondary_locale: String,
}
impl Default for TransformConfig {
    fn default() -> Self {
        let options = TransformOptions::default();
        Self {
            internal_email_marker: options.internal_email_marker,
            primary_locale: options.primary_locale,
            secondary_locale: options.secondary_locale,
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Number(u64),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::String(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

impl Config {
    /// Assemble every layer without extracting.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        figment = match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::Missing(path.to_path_buf()));
                }
                match path.extension().and_then(|e| e.to_str()) {
                    Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                    Some("json") => figment.merge(Json::file_exact(path)),
                    _ => figment.merge(Toml::file_exact(path)),
                }
            },
            None => figment
                .merge(Toml::file(format!("{CONFIG_FILE_NAME}.toml")))
                .merge(Yaml::file(format!("{CONFIG_FILE_NAME}.yaml")))
                .merge(Json::file(format!("{CONFIG_FILE_NAME}.json"))),
        };
        Ok(figment
            .merge(Env::raw().only(&[TOKEN_VAR]).map(|_| "api.token".into()))
            .merge(Env::raw().only(&[SPACE_ID_VAR]).map(|_| "api.space_id".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)?.extract().or_raise(|| ErrorKind::Invalid)?;
        tracing::debug!(
            path = ?path,
            root = %config.storage.root.display(),
            has_token = config.api.token.is_some(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Credentials as configured; blanks are left for the gateway to reject.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.api.token.clone().unwrap_or_default(),
            self.api.space_id.clone().unwrap_or_default(),
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.api.max_attempts,
            initial_delay: Duration::from_millis(self.api.initial_delay_ms),
            max_delay: Duration::from_millis(self.api.max_delay_ms),
        }
    }

    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            base_url: self.api.base_url.clone(),
            per_page: self.api.per_page,
            retry: self.retry_policy(),
            timeout: Duration::from_secs(self.api.timeout_secs),
        }
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            internal_email_marker: self.transform.internal_email_marker.clone(),
            primary_locale: self.transform.primary_locale.clone(),
            secondary_locale: self.transform.secondary_locale.clone(),
        }
    }

    pub fn migration_options(&self) -> MigrationOptions {
        MigrationOptions {
            force_full: self.sync.force_full,
            kinds: self.sync.kinds.clone(),
            transform: self.transform_options(),
        }
    }
}
