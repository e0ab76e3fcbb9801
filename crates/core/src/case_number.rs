//! Case-number parsing for court bulletin matching.
//!
//! Courts format case numbers ("expedientes") inconsistently: `EXP. 17/2025`,
//! `00017/2025`, `17 / 2025`, and bulletins sometimes break them across lines.
//! Matching compares a [`CaseNumberKey`] (number without leading zeros plus
//! four-digit year) extracted from the normalized text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::CoreError;
use crate::normalize::normalize;

/// `<number>/<year>` with the number bounded by non-digits on the left.
static CASE_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{1,7})\s*/\s*((?:19|20)\d{2})(?:\D|$)").expect("valid regex")
});

/// Canonical identity of a case number: `number/year`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CaseNumberKey {
    /// Case number with leading zeros removed (`"00017"` -> `"17"`).
    pub number: String,
    /// Four-digit filing year.
    pub year: String,
}

impl CaseNumberKey {
    /// Extract the key from a raw case number.
    ///
    /// Returns `None` when the text lacks either the numeric or the year
    /// component; such a case number is not a valid match target.
    ///
    /// # Examples
    ///
    /// ```
    /// use litis_core::case_number::CaseNumberKey;
    ///
    /// let key = CaseNumberKey::parse("EXP\n  00017/2025").unwrap();
    /// assert_eq!(key.to_string(), "17/2025");
    /// assert!(CaseNumberKey::parse("EXP 17").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize(raw);
        let caps = CASE_KEY_RE.captures(&normalized)?;
        let digits = caps.get(1)?.as_str();
        let year = caps.get(2)?.as_str();

        let trimmed = digits.trim_start_matches('0');
        let number = if trimmed.is_empty() { "0" } else { trimmed };

        Some(Self {
            number: number.to_string(),
            year: year.to_string(),
        })
    }
}

impl fmt::Display for CaseNumberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.year)
    }
}

/// Validate a user-supplied case number, returning its key.
pub fn validate_case_number(raw: &str) -> Result<CaseNumberKey, CoreError> {
    if raw.trim().is_empty() {
        return Err(CoreError::Validation("case_number must not be empty".into()));
    }
    CaseNumberKey::parse(raw).ok_or_else(|| {
        CoreError::Validation(format!(
            "case_number '{}' must contain a number and a four-digit year (e.g. 123/2025)",
            normalize(raw)
        ))
    })
}

/// Whether two raw case numbers refer to the same case.
///
/// Both sides must yield a valid [`CaseNumberKey`]; otherwise the result is
/// `false` even if the raw strings are identical.
pub fn case_numbers_match(a: &str, b: &str) -> bool {
    match (CaseNumberKey::parse(a), CaseNumberKey::parse(b)) {
        (Some(ka), Some(kb)) => ka == kb,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn embedded_newline_matches_flat_form() {
        assert!(case_numbers_match("EXP\n  00017/2025", "EXP 00017/2025"));
    }

    #[test]
    fn different_year_does_not_match() {
        assert!(!case_numbers_match("00017/2025", "00017/2024"));
    }

    #[test]
    fn leading_zeros_and_prefixes_are_ignored() {
        assert!(case_numbers_match("17/2025", "EXP. 0017/2025"));
        assert!(case_numbers_match("17 / 2025", "00017/2025"));
    }

    #[test]
    fn different_number_does_not_match() {
        assert!(!case_numbers_match("117/2025", "17/2025"));
        assert!(!case_numbers_match("17/2025", "171/2025"));
    }

    #[test]
    fn missing_year_or_number_is_not_a_target() {
        assert!(CaseNumberKey::parse("EXP 17").is_none());
        assert!(CaseNumberKey::parse("/2025").is_none());
        assert!(CaseNumberKey::parse("17/25").is_none());
        assert!(!case_numbers_match("EXP 17", "EXP 17"));
    }

    #[test]
    fn suffixes_after_the_year_are_tolerated() {
        let key = CaseNumberKey::parse("123/2025-II").unwrap();
        assert_eq!(key.to_string(), "123/2025");
    }

    #[test]
    fn all_zero_number_keeps_a_single_zero() {
        assert_eq!(CaseNumberKey::parse("000/2025").unwrap().number, "0");
    }

    #[test]
    fn validate_rejects_blank_and_malformed() {
        assert_matches!(validate_case_number("  "), Err(CoreError::Validation(_)));
        assert_matches!(validate_case_number("sin numero"), Err(CoreError::Validation(_)));
        assert_eq!(validate_case_number("17/2025").unwrap().to_string(), "17/2025");
    }
}
