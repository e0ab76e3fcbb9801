//! Bulletin-to-case matching.
//!
//! Given one ingested bulletin entry, [`CaseIndex::match_entry`] finds every
//! monitored case it should alert. Two passes run against the index:
//!
//! 1. **Case-number pass** for monitored cases that carry a case number. The
//!    entry's [`CaseNumberKey`] is looked up in a hash index, then each hit is
//!    filtered by court name according to the configured
//!    [`CourtMatchPolicy`].
//! 2. **Name pass** for monitored cases that only carry a party name. Every
//!    token of the monitored name must appear as a token of the normalized
//!    bulletin text, in any order and regardless of accents or case.
//!
//! Several monitored cases (usually belonging to different users) may match
//! the same entry. That is expected and produces one candidate per case.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::case_number::CaseNumberKey;
use crate::error::CoreError;
use crate::normalize::{normalize, tokens};
use crate::types::DbId;

/// Particles that do not count towards the minimum size of a name pattern.
const NAME_PARTICLES: &[&str] = &["DE", "DEL", "LA", "LAS", "LOS", "Y", "E", "VDA"];

/// Minimum number of significant tokens for a monitored party name.
pub const MIN_NAME_TOKENS: usize = 2;

// ---------------------------------------------------------------------------
// Court policy
// ---------------------------------------------------------------------------

/// How court names are compared in the case-number pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtMatchPolicy {
    /// Raw strings must be identical after trimming.
    Exact,
    /// Normalized token sequences must be equal or one must contain the other.
    #[default]
    Normalized,
    /// Court names are not compared at all.
    Ignore,
}

impl CourtMatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
            Self::Ignore => "ignore",
        }
    }

    /// Parse a policy name. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(Self::Exact),
            "normalized" => Some(Self::Normalized),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }

    /// Whether a monitored court name accepts a bulletin court name.
    pub fn courts_match(&self, monitored: &str, bulletin: &str) -> bool {
        match self {
            Self::Exact => monitored.trim() == bulletin.trim(),
            Self::Ignore => true,
            Self::Normalized => {
                let a = tokens(monitored).join(" ");
                let b = tokens(bulletin).join(" ");
                if a.is_empty() || b.is_empty() {
                    return false;
                }
                a == b || contains_phrase(&a, &b) || contains_phrase(&b, &a)
            }
        }
    }
}

/// Whole-token containment of `needle` inside `haystack`.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    format!(" {haystack} ").contains(&format!(" {needle} "))
}

// ---------------------------------------------------------------------------
// Name patterns
// ---------------------------------------------------------------------------

/// A monitored party name reduced to the tokens that must all be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    tokens: Vec<String>,
}

impl NamePattern {
    /// Build a pattern from a raw party name.
    ///
    /// Returns `None` if the name has fewer than [`MIN_NAME_TOKENS`]
    /// significant tokens; a single surname would match far too broadly.
    pub fn parse(name: &str) -> Option<Self> {
        let tokens = tokens(name);
        let significant = tokens
            .iter()
            .filter(|t| !NAME_PARTICLES.contains(&t.as_str()))
            .count();
        if significant < MIN_NAME_TOKENS {
            return None;
        }
        Some(Self { tokens })
    }

    /// True when every pattern token appears in `text_tokens`.
    pub fn matches(&self, text_tokens: &HashSet<String>) -> bool {
        self.tokens.iter().all(|t| text_tokens.contains(t))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// Validate a user-supplied party name for monitoring.
pub fn validate_party_name(name: &str) -> Result<NamePattern, CoreError> {
    NamePattern::parse(name).ok_or_else(|| {
        CoreError::Validation(format!(
            "party_name must contain at least {MIN_NAME_TOKENS} name tokens"
        ))
    })
}

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// The subset of a monitored case the matcher needs.
#[derive(Debug, Clone)]
pub struct MonitoredTarget {
    pub id: DbId,
    pub user_id: DbId,
    pub case_number: Option<String>,
    pub court_name: Option<String>,
    pub party_name: Option<String>,
}

/// The subset of a bulletin entry the matcher needs.
#[derive(Debug, Clone, Copy)]
pub struct EntryView<'a> {
    pub id: DbId,
    pub court_name: &'a str,
    pub case_number: &'a str,
    pub raw_text: &'a str,
}

/// Which pass produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    CaseNumber,
    Name,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaseNumber => "case_number",
            Self::Name => "name",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "case_number" => Some(Self::CaseNumber),
            "name" => Some(Self::Name),
            _ => None,
        }
    }
}

/// One (bulletin entry, monitored case) pair that should produce an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchCandidate {
    pub bulletin_entry_id: DbId,
    pub monitored_case_id: DbId,
    pub user_id: DbId,
    pub kind: MatchKind,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct KeyedTarget {
    id: DbId,
    user_id: DbId,
    court_name: Option<String>,
}

#[derive(Debug, Clone)]
struct NamedTarget {
    id: DbId,
    user_id: DbId,
    pattern: NamePattern,
}

/// Pre-built lookup structure over the active monitored cases.
///
/// Built once per ingestion run and reused for every entry in the batch.
#[derive(Debug, Clone, Default)]
pub struct CaseIndex {
    policy: CourtMatchPolicy,
    by_key: HashMap<CaseNumberKey, Vec<KeyedTarget>>,
    by_name: Vec<NamedTarget>,
    rejected: Vec<DbId>,
}

impl CaseIndex {
    /// Index `targets`.
    ///
    /// Targets with a case number lacking a number or year component, and
    /// name-only targets with too few tokens, are not indexed; their ids are
    /// available through [`CaseIndex::rejected`].
    pub fn build<I>(targets: I, policy: CourtMatchPolicy) -> Self
    where
        I: IntoIterator<Item = MonitoredTarget>,
    {
        let mut index = Self {
            policy,
            ..Self::default()
        };

        for target in targets {
            match target.case_number.as_deref().filter(|c| !c.trim().is_empty()) {
                Some(case_number) => match CaseNumberKey::parse(case_number) {
                    Some(key) => index.by_key.entry(key).or_default().push(KeyedTarget {
                        id: target.id,
                        user_id: target.user_id,
                        court_name: target.court_name.filter(|c| !c.trim().is_empty()),
                    }),
                    None => index.rejected.push(target.id),
                },
                None => match target.party_name.as_deref().and_then(NamePattern::parse) {
                    Some(pattern) => index.by_name.push(NamedTarget {
                        id: target.id,
                        user_id: target.user_id,
                        pattern,
                    }),
                    None => index.rejected.push(target.id),
                },
            }
        }

        index
    }

    /// Number of indexed targets.
    pub fn len(&self) -> usize {
        self.by_key.values().map(Vec::len).sum::<usize>() + self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of targets that could not be indexed.
    pub fn rejected(&self) -> &[DbId] {
        &self.rejected
    }

    /// Find every monitored case matching `entry`.
    ///
    /// Returns [`CoreError::Validation`] for a malformed entry (no case number
    /// and no text to scan). An entry whose case number has no valid key is
    /// not an error; it simply produces no case-number matches.
    pub fn match_entry(&self, entry: EntryView<'_>) -> Result<Vec<MatchCandidate>, CoreError> {
        let case_number = normalize(entry.case_number);
        let raw_text = normalize(entry.raw_text);
        if case_number.is_empty() && raw_text.is_empty() {
            return Err(CoreError::Validation(format!(
                "bulletin entry {} has neither case number nor text",
                entry.id
            )));
        }

        let mut candidates = Vec::new();

        if let Some(key) = CaseNumberKey::parse(&case_number) {
            for target in self.by_key.get(&key).into_iter().flatten() {
                let court_ok = target
                    .court_name
                    .as_deref()
                    .map_or(true, |court| self.policy.courts_match(court, entry.court_name));
                if court_ok {
                    candidates.push(MatchCandidate {
                        bulletin_entry_id: entry.id,
                        monitored_case_id: target.id,
                        user_id: target.user_id,
                        kind: MatchKind::CaseNumber,
                    });
                }
            }
        }

        if !self.by_name.is_empty() && !raw_text.is_empty() {
            let text_tokens: HashSet<String> = tokens(&raw_text).into_iter().collect();
            for target in &self.by_name {
                if target.pattern.matches(&text_tokens) {
                    candidates.push(MatchCandidate {
                        bulletin_entry_id: entry.id,
                        monitored_case_id: target.id,
                        user_id: target.user_id,
                        kind: MatchKind::Name,
                    });
                }
            }
        }

        Ok(candidates)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
