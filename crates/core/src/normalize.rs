//! Text normalization shared by bulletin matching and search.
//!
//! Court bulletins are published by many different courts with inconsistent
//! casing, accents, and whitespace (case numbers routinely contain embedded
//! line breaks). Every comparison in the matching pipeline goes through
//! [`normalize`] first.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize free text for comparison.
///
/// - Upper-cases.
/// - Strips diacritics (`Á` -> `A`, `Ñ` -> `N`).
/// - Collapses every run of whitespace, including newlines and tabs, into a
///   single space.
/// - Trims leading and trailing whitespace.
///
/// Total over all input: empty or garbage input yields an empty or garbage
/// normalized string, never an error. Idempotent.
///
/// # Examples
///
/// ```
/// use litis_core::normalize::normalize;
///
/// assert_eq!(normalize("  María   López\nHernández "), "MARIA LOPEZ HERNANDEZ");
/// assert_eq!(normalize("EXP\n  00017/2025"), "EXP 00017/2025");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .to_uppercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let mut out = String::with_capacity(folded.len());
    for word in folded.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Split text into normalized alphanumeric tokens.
///
/// Punctuation acts as a separator, so `"LOPEZ HERNANDEZ, MARIA"` yields
/// `["LOPEZ", "HERNANDEZ", "MARIA"]`.
pub fn tokens(text: &str) -> Vec<String> {
    normalize(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
