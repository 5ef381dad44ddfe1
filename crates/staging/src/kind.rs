use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the per-kind status record.
pub const STATUS_FILE: &str = "_status.json";

/// The resource kinds a space is made of. Each owns one top-level
/// directory and never touches another's.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    #[display("components")]
    Components,
    #[display("stories")]
    Stories,
    #[display("assets")]
    Assets,
    #[display("datasources")]
    Datasources,
}
impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [Self::Components, Self::Stories, Self::Assets, Self::Datasources];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Components => "components",
            Self::Stories => "stories",
            Self::Assets => "assets",
            Self::Datasources => "datasources",
        }
    }

    /// Top-level directory of this kind.
    pub fn dir(&self) -> &'static Path {
        Path::new(self.as_str())
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir().join(STATUS_FILE)
    }
}
impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|k| k.as_str() == s).ok_or_else(|| format!("unknown resource kind `{s}`"))
    }
}
