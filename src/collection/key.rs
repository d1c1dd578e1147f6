//! Storage key sanitization.

use std::sync::LazyLock;

use regex::Regex;

/// Key used when a title sanitizes to nothing.
pub const UNKNOWN_COLLECTION: &str = "Unknown_Collection";

#[allow(clippy::expect_used)]
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-. ]").expect("static regex is valid"));

#[allow(clippy::expect_used)]
static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_\s]+").expect("static regex is valid"));

/// Sanitizes a title into a storage key.
///
/// Characters other than word characters, `-`, `.` and space become `_`;
/// runs of `_` and whitespace collapse to a single `_`; leading and trailing
/// `_` are trimmed. The function is idempotent:
/// `sanitize_key(&sanitize_key(x)) == sanitize_key(x)`.
///
/// # Examples
///
/// ```
/// use series_downloader::sanitize_key;
///
/// assert_eq!(sanitize_key("Solo Leveling"), "Solo_Leveling");
/// assert_eq!(sanitize_key("  a / b  "), "a_b");
/// assert_eq!(sanitize_key("???"), "Unknown_Collection");
/// ```
#[must_use]
pub fn sanitize_key(title: &str) -> String {
    let replaced = DISALLOWED.replace_all(title, "_");
    let collapsed = SEPARATOR_RUNS.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        UNKNOWN_COLLECTION.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key_replaces_punctuation() {
        assert_eq!(sanitize_key("Naruto: Shippuden!"), "Naruto_Shippuden");
    }

    #[test]
    fn test_sanitize_key_keeps_dash_and_dot() {
        assert_eq!(sanitize_key("Vol.2 - Part-1"), "Vol.2_-_Part-1");
    }

    #[test]
    fn test_sanitize_key_keeps_unicode_word_chars() {
        assert_eq!(sanitize_key("Đấu Phá Thương Khung"), "Đấu_Phá_Thương_Khung");
    }

    #[test]
    fn test_sanitize_key_collapses_runs() {
        assert_eq!(sanitize_key("a  __ \t b"), "a_b");
    }

    #[test]
    fn test_sanitize_key_empty_falls_back() {
        assert_eq!(sanitize_key(""), UNKNOWN_COLLECTION);
        assert_eq!(sanitize_key("__"), UNKNOWN_COLLECTION);
    }

    #[test]
    fn test_sanitize_key_is_idempotent() {
        for title in [
            "One Piece",
            "  Spaced  Out  ",
            "Weird/Chars\\Here?*",
            "Đấu Phá: Thương Khung",
            "___",
            "a.b-c_d e",
        ] {
            let once = sanitize_key(title);
            assert_eq!(sanitize_key(&once), once, "not idempotent for {title:?}");
        }
    }
}
