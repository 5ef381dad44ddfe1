//! Key validation.
//!
//! Every key handed to a backend is a relative path below the storage root.
//! Keys are normalized here so that the filesystem and in-memory backends
//! agree on what "the same key" means.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Suffix reserved for in-flight atomic writes of the local backend.
pub(crate) const PARTIAL_SUFFIX: &str = ".partial";

/// Validates and normalizes a storage key.
///
/// - `.` components and duplicate separators are dropped,
/// - `..` is resolved but may never climb above the root,
/// - null bytes, platform prefixes and empty keys are rejected,
/// - the [`PARTIAL_SUFFIX`] is reserved and rejected as a final component.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use decant_storage::validate_path;
/// assert_eq!(
///     validate_path("stories//person/./42-jane-doe.json").unwrap(),
///     Path::new("stories/person/42-jane-doe.json"),
/// );
/// assert!(validate_path("../mapping.json").is_err());
/// assert!(validate_path("stories/_status.json.partial").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in original.components() {
        match component {
            Component::Normal(segment) => {
                // Path::components() lets null bytes through on Unix.
                if segment.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                normalized.push(segment);
            },
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir => {
                if !normalized.pop() {
                    exn::bail!(invalid());
                }
            },
            Component::Prefix(_) => exn::bail!(invalid()),
        }
    }
    let Some(last) = normalized.file_name().and_then(|name| name.to_str()) else {
        exn::bail!(invalid());
    };
    if last.ends_with(PARTIAL_SUFFIX) {
        exn::bail!(invalid());
    }
    Ok(normalized)
}
