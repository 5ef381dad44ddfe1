//! File naming inside a kind's directory: `<id>-<name>.<ext>`.

/// Keep `[A-Za-z0-9._-]`, replace anything else with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect()
}

/// `<id>-<name>.json`, or `<id>.json` for a nameless record.
pub(crate) fn record_file_name(id: u64, name: &str) -> String {
    match sanitize(name).trim_matches('.') {
        "" => format!("{id}.json"),
        name => format!("{id}-{name}.json"),
    }
}

/// The numeric id a file name starts with.
///
/// Only a full run of digits terminated by `-` or `.` counts, so `42-a.json`
/// belongs to 42 but not to 4 or 421.
pub fn id_of(file_name: &str) -> Option<u64> {
    let end = file_name.find(['-', '.'])?;
    let digits = &file_name[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
