//! Cheap syntactic checks run before the validation adapter is consulted
//!
//! These only reject input that is obviously still being typed or
//! malformed; whether a URL actually resolves is the adapter's call.

use once_cell::sync::Lazy;
use regex::Regex;

use super::context::PLACEHOLDER_URL;

// Accepts google.com, www.google.com, https://google.com/path, capta.co
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?://)?([\w-]+\.)*[\w-]+\.[\w-]{2,}(/.*)?$")
        .expect("URL pattern is a valid regex")
});

/// Returns true if `input` looks like a complete URL
pub fn is_well_formed_url(input: &str) -> bool {
    let url = input.trim();

    if url.is_empty() || url == PLACEHOLDER_URL {
        return false;
    }
    if url.contains(char::is_whitespace) || url.contains("..") {
        return false;
    }

    URL_PATTERN.is_match(url)
}
