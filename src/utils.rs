//! Small string and filesystem helpers.
//!
//! - Truncation for log lines and for article bodies
//! - File-name sanitizing and slugs for per-session image folders
//! - Output directory validation

use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static UNSAFE_FILE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w.\-]").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a byte
/// count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Keep at most `cap` characters, appending `…` when anything was dropped.
pub fn truncate_with_ellipsis(s: &str, cap: usize) -> String {
    match s.char_indices().nth(cap) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…", &s[..cut]),
    }
}

/// Make `name` safe to use as a single path component.
///
/// Anything other than a Unicode word character (letters, digits, `_`), `.`
/// or `-` becomes `_`, so `ñ` survives but `/` does not. Names made only of
/// dots (`.`, `..`) or left empty would escape or alias a directory and come
/// back as underscores instead.
///
/// # Arguments
///
/// * `name` - Proposed file name
/// * `max_len` - Maximum length in characters
///
/// # Returns
///
/// A non-empty file name of at most `max_len` characters (when `max_len > 0`).
pub fn sanitize_file_name(name: &str, max_len: usize) -> String {
    let cleaned: String = UNSAFE_FILE_CHARS
        .replace_all(name, "_")
        .chars()
        .take(max_len)
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        let len = cleaned.chars().count().max(1).min(max_len.max(1));
        return "_".repeat(len);
    }
    cleaned
}

/// Lowercase, hyphenated form of a session label, used for folder names.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Safari macOS Ventura"), "safari-macos-ventura");
/// ```
pub fn slugify(label: &str) -> String {
    label
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let scratch_path = path.join("..__write_check__");
    stdfs::File::create(&scratch_path)?;
    let _ = stdfs::remove_file(&scratch_path);
    info!("Output directory is writable");
    Ok(())
}
