//! Source-link validation and display-text normalization.
//!
//! Accepted link shapes (scheme and `www.` optional):
//!
//! - `youtube.com/watch?v=<id>`
//! - `music.youtube.com/watch?v=<id>`
//! - `youtu.be/<id>`
//!
//! All of them normalize to the canonical `https://www.youtube.com/watch?v=<id>`
//! form, which is the cache key and the link handed to the extraction tool.

use crate::error::{MetadataError, Result};

/// A validated, normalized source link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLink {
    /// Canonical watch URL used as the cache key.
    pub canonical: String,
    /// The source's stable identifier, used for content-addressed payload
    /// paths.
    pub id: String,
}

/// Validate a raw link and normalize it to canonical form.
///
/// # Errors
///
/// Returns [`MetadataError::InvalidLink`] when the link does not match any
/// accepted shape or carries an empty id.
pub fn parse_source_link(raw: &str) -> Result<SourceLink> {
    let trimmed = raw.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);

    let id_part = rest
        .strip_prefix("youtube.com/watch?v=")
        .or_else(|| rest.strip_prefix("music.youtube.com/watch?v="))
        .or_else(|| rest.strip_prefix("youtu.be/"))
        .ok_or_else(|| MetadataError::InvalidLink(raw.to_string()))?;

    // The id runs until the first query/fragment separator.
    let id: String = id_part
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if id.is_empty() {
        return Err(MetadataError::InvalidLink(raw.to_string()));
    }

    Ok(SourceLink {
        canonical: format!("https://www.youtube.com/watch?v={id}"),
        id,
    })
}

/// Strip characters the chat layer would interpret as markdown.
pub fn sanitize_display_text(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '*' | '_' | '#' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '|' | '\\' | '{' | '}'))
        .collect()
}

/// Normalize the uploader name reported by the extraction tool.
///
/// Auto-generated source channels carry a `" - Topic"` suffix that is noise
/// in display names; a missing uploader falls back to `"Unknown Artist"`.
pub fn normalize_artist(raw: Option<&str>) -> String {
    match raw {
        Some(name) => {
            let name = name.strip_suffix(" - Topic").unwrap_or(name);
            let cleaned = sanitize_display_text(name);
            if cleaned.trim().is_empty() {
                "Unknown Artist".to_string()
            } else {
                cleaned
            }
        }
        None => "Unknown Artist".to_string(),
    }
}
