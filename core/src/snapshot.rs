//! Snapshot input: the current state of every open ticket for one poll.
//!
//! The fetcher is an external collaborator; `SnapshotSource` is its seam.
//! A fetch either yields a whole batch or fails before the ledger is touched.

use crate::{
    error::{LedgerError, LedgerResult},
    types::{TicketKey, UNASSIGNED},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One ticket as observed at poll time. Not a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub ticket_no: TicketKey,
    pub module:    String,
    pub label:     String,
    pub priority:  String,
    pub status:    String,
    #[serde(default)]
    pub assignee:  Option<String>,
}

impl SnapshotRecord {
    pub fn assignee(&self) -> &str {
        match self.assignee.as_deref() {
            Some(a) if !a.trim().is_empty() => a,
            _ => UNASSIGNED,
        }
    }
}

pub trait SnapshotSource {
    fn fetch(&mut self) -> LedgerResult<Vec<SnapshotRecord>>;
}

/// A batch held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<SnapshotRecord>,
}

impl StaticSource {
    pub fn new(records: Vec<SnapshotRecord>) -> Self {
        Self { records }
    }
}

impl SnapshotSource for StaticSource {
    fn fetch(&mut self) -> LedgerResult<Vec<SnapshotRecord>> {
        Ok(self.records.clone())
    }
}

/// Reject batches the merge cannot apply order-insensitively.
pub fn validate_batch(records: &[SnapshotRecord]) -> LedgerResult<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for r in records {
        if r.ticket_no.trim().is_empty() {
            return Err(LedgerError::MalformedSnapshot {
                ticket_no: r.ticket_no.clone(),
                reason: "record has no ticket key".into(),
            });
        }
        if !seen.insert(r.ticket_no.as_str()) {
            return Err(LedgerError::MalformedSnapshot {
                ticket_no: r.ticket_no.clone(),
                reason: "ticket appears more than once in one snapshot".into(),
            });
        }
    }
    Ok(())
}

// ── Tracker search response ────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    status: Option<Named>,
    assignee: Option<Person>,
    labels: Option<Vec<String>>,
    priority: Option<Named>,
    components: Option<Vec<Named>>,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Person {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

impl From<SearchIssue> for SnapshotRecord {
    fn from(issue: SearchIssue) -> Self {
        let f = issue.fields;
        Self {
            ticket_no: issue.key,
            module: f
                .components
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.name)
                .collect::<Vec<_>>()
                .join(","),
            label: f.labels.unwrap_or_default().join(","),
            priority: f
                .priority
                .map(|p| p.name)
                .unwrap_or_else(|| "None".to_string()),
            status: f.status.map(|s| s.name).unwrap_or_default(),
            assignee: f.assignee.and_then(|a| a.display_name),
        }
    }
}

/// Parse a saved issue-search response (`{"issues": [{"key", "fields": {..}}]}`).
pub fn parse_search_response(json: &str) -> LedgerResult<Vec<SnapshotRecord>> {
    let resp: SearchResponse = serde_json::from_str(json)
        .map_err(|e| LedgerError::Fetch(format!("invalid search response: {e}")))?;
    Ok(resp.issues.into_iter().map(SnapshotRecord::from).collect())
}

/// Reads one search response from disk per fetch.
#[derive(Debug, Clone)]
pub struct TrackerSearchFile {
    path: PathBuf,
}

impl TrackerSearchFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SnapshotSource for TrackerSearchFile {
    fn fetch(&mut self) -> LedgerResult<Vec<SnapshotRecord>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            LedgerError::Fetch(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let records = parse_search_response(&content)?;
        log::info!(
            "Fetched {} tickets from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}
