//! Listing metadata returned by storage backends.

use std::path::{Path, PathBuf};
use time::UtcDateTime;

/// Metadata for one stored key, as returned by listing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// Payload size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: UtcDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: impl Into<UtcDateTime>) -> Self {
        Self {
            path: path.into(),
            size,
            modified: modified.into(),
        }
    }

    /// Final path component as UTF-8, if it has one.
    ///
    /// Staging keys are always ASCII, so anything else is somebody else's
    /// file and gets skipped by the callers.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    /// Whether this entry lives directly inside `dir` (not in a subdirectory).
    pub fn is_child_of(&self, dir: impl AsRef<Path>) -> bool {
        self.path.parent() == Some(dir.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let info = FileInfo::new("stories/person/42-jane-doe.json", 10, UtcDateTime::now());
        assert_eq!(info.file_name(), Some("42-jane-doe.json"));
    }

    #[test]
    fn test_is_child_of() {
        let info = FileInfo::new("assets/files/7-logo.png", 10, UtcDateTime::now());
        assert!(info.is_child_of("assets/files"));
        assert!(!info.is_child_of("assets"));
        assert!(!info.is_child_of("assets/metadata"));
    }
}
