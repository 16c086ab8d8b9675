//! Verdict & aggregation: joins ledger rows with the reference tables.
//!
//! Both joins are inner joins:
//!   - no owner for (module, label)  -> ticket excluded from detail and rollup
//!   - current status untracked or without an SLA rule -> ticket excluded
//!
//! Exclusions are counted and logged, never raised as errors.

use crate::{
    ledger::{StatusTimes, TicketLedgerRow},
    lookup::ReferenceTables,
    status::CanonicalStatus,
    types::{Minutes, TicketKey},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Needs attention")]
    NeedsAttention,
    #[serde(rename = "Within limit")]
    WithinLimit,
}

impl Verdict {
    /// Strictly greater than the allowed time needs attention; equal is fine.
    pub fn judge(spent: Minutes, allowed: Minutes) -> Self {
        if spent > allowed {
            Self::NeedsAttention
        } else {
            Self::WithinLimit
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeedsAttention => write!(f, "Needs attention"),
            Self::WithinLimit    => write!(f, "Within limit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRow {
    pub ticket_no:      TicketKey,
    pub module:         String,
    pub label:          String,
    pub priority:       String,
    pub status_time:    StatusTimes,
    pub reopened_count: u32,
    pub current_status: CanonicalStatus,
    pub assignee:       String,
    pub last_updated:   DateTime<Utc>,
    pub owner:          String,
    pub allowed_time:   Minutes,
    pub verdict:        Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupRow {
    pub owner:                 String,
    pub module:                String,
    pub label:                 String,
    pub needs_attention_count: u64,
    pub within_limit_count:    u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionCounts {
    pub unmapped_owner: u64,
    pub no_sla_rule:    u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub detail:     Vec<DetailRow>,
    pub rollup:     Vec<RollupRow>,
    pub exclusions: ExclusionCounts,
}

impl Report {
    pub fn needs_attention(&self) -> impl Iterator<Item = &DetailRow> {
        self.detail
            .iter()
            .filter(|d| d.verdict == Verdict::NeedsAttention)
    }

    pub fn detail_for_owner<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a DetailRow> + 'a {
        self.detail.iter().filter(move |d| d.owner == owner)
    }

    pub fn detail_for_priority<'a>(
        &'a self,
        priority: &'a str,
    ) -> impl Iterator<Item = &'a DetailRow> + 'a {
        self.detail.iter().filter(move |d| d.priority == priority)
    }

    /// Distinct priorities present in the detail view, sorted.
    pub fn priorities(&self) -> Vec<&str> {
        self.detail
            .iter()
            .map(|d| d.priority.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Judge one row. `None` when either inner join drops it.
pub fn evaluate_row(row: &TicketLedgerRow, refs: &ReferenceTables) -> Option<DetailRow> {
    let owner = refs.owners.owner_of(&row.module, &row.label)?;
    let (status, spent) = row.time_in_current_status()?;
    let allowed = refs.sla.allowed_time(status)?;

    Some(DetailRow {
        ticket_no:      row.ticket_no.clone(),
        module:         row.module.clone(),
        label:          row.label.clone(),
        priority:       row.priority.clone(),
        status_time:    row.status_time,
        reopened_count: row.reopened_count,
        current_status: row.current_status.clone(),
        assignee:       row.assignee.clone(),
        last_updated:   row.last_updated,
        owner:          owner.to_string(),
        allowed_time:   allowed,
        verdict:        Verdict::judge(spent, allowed),
    })
}

/// Build the detail and rollup views for the given ledger rows.
///
/// Detail is ordered by ticket key. Rollup is ordered by needs-attention
/// count descending, then owner, module and label ascending.
pub fn evaluate(rows: &[TicketLedgerRow], refs: &ReferenceTables) -> Report {
    let mut detail = Vec::new();
    let mut exclusions = ExclusionCounts::default();

    for row in rows {
        if refs.owners.owner_of(&row.module, &row.label).is_none() {
            exclusions.unmapped_owner += 1;
            continue;
        }
        match evaluate_row(row, refs) {
            Some(d) => detail.push(d),
            None => exclusions.no_sla_rule += 1,
        }
    }
    detail.sort_by(|a, b| a.ticket_no.cmp(&b.ticket_no));

    if exclusions.unmapped_owner > 0 {
        log::warn!(
            "{} ticket(s) have no owner mapping and are excluded from reporting",
            exclusions.unmapped_owner
        );
    }
    if exclusions.no_sla_rule > 0 {
        log::warn!(
            "{} ticket(s) are in a status without an SLA rule",
            exclusions.no_sla_rule
        );
    }

    let rollup = rollup(&detail);
    Report {
        detail,
        rollup,
        exclusions,
    }
}

/// Group detail rows by (owner, module, label) and count verdicts.
pub fn rollup(detail: &[DetailRow]) -> Vec<RollupRow> {
    let mut groups: BTreeMap<(&str, &str, &str), (u64, u64)> = BTreeMap::new();
    for d in detail {
        let counts = groups
            .entry((d.owner.as_str(), d.module.as_str(), d.label.as_str()))
            .or_default();
        match d.verdict {
            Verdict::NeedsAttention => counts.0 += 1,
            Verdict::WithinLimit    => counts.1 += 1,
        }
    }

    let mut out: Vec<RollupRow> = groups
        .into_iter()
        .map(|((owner, module, label), (attention, within))| RollupRow {
            owner:                 owner.to_string(),
            module:                module.to_string(),
            label:                 label.to_string(),
            needs_attention_count: attention,
            within_limit_count:    within,
        })
        .collect();

    // BTreeMap order already covers the ascending tie-breaks; the sort is stable.
    out.sort_by(|a, b| b.needs_attention_count.cmp(&a.needs_attention_count));
    out
}
