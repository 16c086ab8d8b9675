//! Canonical workflow-status vocabulary.
//!
//! RULE: every status string entering the ledger goes through
//! `StatusVocabulary::normalize` first. Comparisons against `Reopened`
//! and bucket selection only ever see canonical forms.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Canonical spelling of the reopened status.
pub const REOPENED: &str = "reopened";

/// Stored when the tracker reports an empty status.
pub const UNKNOWN: &str = "unknown";

/// The statuses that accrue time. Each owns one ledger column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedStatus {
    Open,
    InAnalysis,
    ReadyForTesting,
}

impl TrackedStatus {
    pub const ALL: [TrackedStatus; 3] = [
        TrackedStatus::Open,
        TrackedStatus::InAnalysis,
        TrackedStatus::ReadyForTesting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open            => "open",
            Self::InAnalysis      => "in_analysis",
            Self::ReadyForTesting => "ready_for_testing",
        }
    }

    pub fn from_canonical(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for TrackedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status string after normalization. May or may not be tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalStatus(String);

impl CanonicalStatus {
    /// Wrap a value already in canonical form (e.g. read back from the ledger).
    pub fn from_stored(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn tracked(&self) -> Option<TrackedStatus> {
        TrackedStatus::from_canonical(&self.0)
    }

    pub fn is_reopened(&self) -> bool {
        self.0 == REOPENED
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, trim, and collapse runs of whitespace, `-` and `_` into one `_`.
pub fn fold(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(ch.to_lowercase());
    }
    out
}

/// Status normalizer with optional tracker-specific aliases.
#[derive(Debug, Clone, Default)]
pub struct StatusVocabulary {
    aliases: HashMap<String, String>,
}

impl StatusVocabulary {
    /// Alias keys and targets are folded the same way as incoming statuses,
    /// so `"To Do" -> "Open"` matches `to do`, `TO-DO` and `to_do`.
    pub fn new(aliases: &HashMap<String, String>) -> Self {
        let aliases = aliases
            .iter()
            .map(|(from, to)| (fold(from), fold(to)))
            .filter(|(from, to)| !from.is_empty() && !to.is_empty())
            .collect();
        Self { aliases }
    }

    pub fn normalize(&self, raw: &str) -> CanonicalStatus {
        let folded = fold(raw);
        if folded.is_empty() {
            return CanonicalStatus(UNKNOWN.to_string());
        }
        match self.aliases.get(&folded) {
            Some(target) => CanonicalStatus(target.clone()),
            None => CanonicalStatus(folded),
        }
    }
}
