//! Content validation and markup stripping for submitted posts.

use domains::{DomainError, MAX_CONTENT_CHARS};
use once_cell::sync::Lazy;
use regex::Regex;

/// A whole `<script>` element, body included. An unterminated script runs to
/// the end of the text.
static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?(?:</script\s*>|$)").expect("script pattern is valid")
});

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Removes script elements first, then every remaining tag.
///
/// Passes repeat until nothing changes, so no tag can be left behind by
/// text that only closes up once another tag is removed.
pub fn strip_markup(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let without_scripts = SCRIPT_BLOCK.replace_all(&current, "");
        let without_tags = MARKUP_TAG.replace_all(&without_scripts, "").into_owned();
        if without_tags == current {
            return current;
        }
        current = without_tags;
    }
}

/// Turns raw submitted text into storable content.
///
/// Nothing is persisted or sent anywhere before this succeeds.
pub fn prepare_content(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::EmptyContent);
    }

    let sanitized = strip_markup(trimmed).trim().to_string();
    if sanitized.is_empty() {
        return Err(DomainError::EmptyContent);
    }

    let chars = sanitized.chars().count();
    if chars > MAX_CONTENT_CHARS {
        return Err(DomainError::ContentTooLong(chars));
    }

    Ok(sanitized)
}
