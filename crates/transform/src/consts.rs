use regex::Regex;
use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Deliberately loose: one `@`, no whitespace, a dot in the domain.
regex!(EMAIL_REGEX, r"^[^\s@]+@[^\s@]+\.[^\s@]+$");

/// Fallback for a missing title.
pub const UNTITLED: &str = "Untitled";
/// Fallback for a missing category (or role) label.
pub const UNKNOWN: &str = "Unknown";

pub(crate) fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value.trim())
}
