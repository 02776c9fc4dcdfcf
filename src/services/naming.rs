//! Storage names for uploaded files and project folders.

use crate::models::category::Category;
use chrono::{DateTime, Utc};

/// Final `.ext` suffix of `name`, including the dot; empty when there is none.
pub fn file_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() && !name[idx + 1..].contains('/') => &name[idx..],
        _ => "",
    }
}

/// `name` without its extension.
pub fn file_stem(name: &str) -> &str {
    &name[..name.len() - file_extension(name).len()]
}

/// `{category}_V{sequence}{extension}`.
pub fn saved_name(category: Category, sequence: u32, original_name: &str) -> String {
    format!(
        "{}_V{}{}",
        category.as_str(),
        sequence,
        file_extension(original_name)
    )
}

/// Make a free-form string safe for a folder name: `[A-Za-z0-9_-]` only,
/// whitespace runs become one `_`, no leading or trailing `_`.
pub fn sanitize_token(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let mapped = if c.is_whitespace() { '_' } else { c };
        if !(mapped.is_ascii_alphanumeric() || mapped == '_' || mapped == '-') {
            continue;
        }
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('_').to_string()
}

/// UTC timestamp in folder-name form, `YYYY-MM-DD_HH-MM-SS`.
pub fn folder_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// `{artist}_{songBase}_{timestamp}` where `songBase` is the first file's stem.
pub fn project_folder_name(artist: &str, first_file: &str, at: DateTime<Utc>) -> String {
    let artist = match sanitize_token(artist) {
        s if s.is_empty() => "unknown_artist".to_string(),
        s => s,
    };
    let song = match sanitize_token(file_stem(first_file)) {
        s if s.is_empty() => "project".to_string(),
        s => s,
    };
    format!("{artist}_{song}_{}", folder_timestamp(at))
}
