//! Utility functions for Markdown cleanup, log truncation, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Markdown/HTML cell cleanup for README listings
//! - URL extraction from table cells in every format the listings use
//! - String truncation for logging and error bodies
//! - File system validation for output directories

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static DECORATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[🔥🎓🛂🔒↳\x{1F1FA}\x{1F1F8}]").unwrap());
static HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href=["']([^"']+)["']"#).unwrap());
static LINK_TARGET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\]\(([^)]+)\)").unwrap());
static BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"]+"#).unwrap());
static LINK_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (backing off to the
/// nearest char boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Strip Markdown emphasis, links, HTML tags and listing decorations from a
/// table cell, collapsing whitespace.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(clean_markdown("**[Acme](https://acme.io)** 🔥"), "Acme");
/// ```
pub fn clean_markdown(text: &str) -> String {
    let text = BOLD.replace_all(text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = DECORATION.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the first URL from a table cell.
///
/// Tries, in order, an HTML `href` attribute, a Markdown link target, and a
/// bare `http(s)://` URL. Returns `None` when the cell holds no URL.
pub fn extract_url(cell: &str) -> Option<String> {
    if let Some(c) = HREF.captures(cell) {
        return Some(c[1].to_string());
    }
    if let Some(c) = LINK_TARGET.captures(cell) {
        return Some(c[1].to_string());
    }
    BARE_URL.find(cell).map(|m| m.as_str().to_string())
}

/// Extract a company name from a listing cell such as `**[Acme](url)**`.
pub fn extract_company_name(cell: &str) -> String {
    let cell = DECORATION.replace_all(cell, "");
    if let Some(c) = LINK_TEXT.captures(&cell) {
        return c[1].trim().to_string();
    }
    clean_markdown(&cell)
}

/// Escape pipe characters so a value can sit inside a Markdown table cell.
pub fn escape_pipes(s: &str) -> String {
    s.replace('|', "\\|")
}

/// Capitalize the first character and lowercase the rest.
///
/// Used to turn discovered board slugs into display names
/// (e.g., "acmerobotics" -> "Acmerobotics").
pub fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + &c.as_str().to_lowercase(),
    }
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 3);
        assert!(result.starts_with('é'));
        assert!(result.contains("(+18 bytes)"));
    }

    #[test]
    fn test_clean_markdown() {
        assert_eq!(clean_markdown("**Acme**"), "Acme");
        assert_eq!(clean_markdown("[Acme](https://acme.io)"), "Acme");
        assert_eq!(clean_markdown("Boston, MA</br>Remote"), "Boston, MA Remote");
        assert_eq!(clean_markdown("Software Intern 🛂 🇺🇸"), "Software Intern");
        assert_eq!(clean_markdown("  lots   of\tspace "), "lots of space");
    }

    #[test]
    fn test_extract_url_formats() {
        assert_eq!(
            extract_url(r#"<a href="https://a.io/apply"><img src="x"></a>"#).as_deref(),
            Some("https://a.io/apply")
        );
        assert_eq!(
            extract_url("[Apply](https://b.io/job/1)").as_deref(),
            Some("https://b.io/job/1")
        );
        assert_eq!(
            extract_url("see https://c.io/x now").as_deref(),
            Some("https://c.io/x")
        );
        assert_eq!(extract_url("no link here"), None);
    }

    #[test]
    fn test_extract_company_name() {
        assert_eq!(extract_company_name("**[Acme](https://acme.io)**"), "Acme");
        assert_eq!(extract_company_name("🔥 Globex"), "Globex");
        assert_eq!(extract_company_name("↳"), "");
    }

    #[test]
    fn test_escape_pipes() {
        assert_eq!(escape_pipes("R&D | Robotics"), "R&D \\| Robotics");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("acme"), "Acme");
        assert_eq!(capitalize("ACME"), "Acme");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("reports/daily");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
