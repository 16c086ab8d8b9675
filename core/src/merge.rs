//! Merge engine: applies one snapshot batch to the ledger.
//!
//! Time accrual: one fixed quantum per observation, credited to the bucket
//! of the status the ticket is in *now*. Untracked statuses accrue nothing.
//!
//! Reopen counting is edge-triggered: +1 only when an existing row moves
//! from a non-reopened status into reopened. A first sighting never counts.
//!
//! Metadata (module, label, priority, assignee, status, last_updated) is
//! last-write-wins.

use crate::{
    config::LedgerConfig,
    error::LedgerResult,
    ledger::{StatusTimes, TicketLedgerRow},
    snapshot::SnapshotRecord,
    status::{CanonicalStatus, StatusVocabulary},
    store::{LedgerStore, LedgerTx},
    types::Minutes,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts for one applied batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub records:            u64,
    pub inserted:           u64,
    pub updated:            u64,
    pub reopen_transitions: u64,
    /// Observations whose status accrues no time.
    pub untracked:          u64,
}

/// What happened to a single ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub inserted:  bool,
    pub reopened:  bool,
    pub tracked:   bool,
}

/// True only on a transition into reopened from some other status.
pub fn is_reopen_transition(prior: &CanonicalStatus, next: &CanonicalStatus) -> bool {
    !prior.is_reopened() && next.is_reopened()
}

#[derive(Debug, Clone)]
pub struct MergeEngine {
    quantum: Minutes,
    vocab:   StatusVocabulary,
}

impl MergeEngine {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            quantum: config.poll_quantum,
            vocab:   config.vocabulary(),
        }
    }

    /// The pure transition: prior row (if any) + observation -> new row.
    pub fn next_row(
        &self,
        prior: Option<&TicketLedgerRow>,
        record: &SnapshotRecord,
        now: DateTime<Utc>,
    ) -> TicketLedgerRow {
        let status = self.vocab.normalize(&record.status);

        let (mut status_time, reopened_count) = match prior {
            None => (StatusTimes::default(), 0),
            Some(p) => {
                let bump = u32::from(is_reopen_transition(&p.current_status, &status));
                (p.status_time, p.reopened_count.saturating_add(bump))
            }
        };
        if let Some(tracked) = status.tracked() {
            status_time.credit(tracked, self.quantum);
        }

        TicketLedgerRow {
            ticket_no:      record.ticket_no.clone(),
            module:         record.module.clone(),
            label:          record.label.clone(),
            priority:       record.priority.clone(),
            status_time,
            reopened_count,
            current_status: status,
            assignee:       record.assignee().to_string(),
            last_updated:   now,
        }
    }

    pub fn apply_record(
        &self,
        tx: &LedgerTx<'_>,
        record: &SnapshotRecord,
        now: DateTime<Utc>,
    ) -> LedgerResult<RecordOutcome> {
        let up = tx.upsert(&record.ticket_no, |prior| self.next_row(prior, record, now))?;

        let reopened = up
            .prior
            .as_ref()
            .is_some_and(|p| p.reopened_count < up.row.reopened_count);
        let tracked = up.row.current_status.tracked().is_some();

        if !tracked && !up.row.current_status.is_reopened() {
            log::warn!(
                "{}: status '{}' is not tracked; no time credited",
                record.ticket_no,
                up.row.current_status
            );
        }
        if reopened {
            log::debug!(
                "{}: reopened (count now {})",
                record.ticket_no,
                up.row.reopened_count
            );
        }

        Ok(RecordOutcome {
            inserted: up.inserted(),
            reopened,
            tracked,
        })
    }

    /// Apply every record through `tx`. The caller owns commit/rollback;
    /// an error here leaves the transaction to be dropped.
    pub fn apply_batch(
        &self,
        tx: &LedgerTx<'_>,
        records: &[SnapshotRecord],
        now: DateTime<Utc>,
    ) -> LedgerResult<MergeSummary> {
        let mut summary = MergeSummary::default();
        for record in records {
            let outcome = self.apply_record(tx, record, now)?;
            summary.records += 1;
            if outcome.inserted {
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
            if outcome.reopened {
                summary.reopen_transitions += 1;
            }
            if !outcome.tracked {
                summary.untracked += 1;
            }
        }
        Ok(summary)
    }

    /// Apply a batch in its own all-or-nothing transaction.
    pub fn merge(
        &self,
        store: &mut LedgerStore,
        records: &[SnapshotRecord],
        now: DateTime<Utc>,
    ) -> LedgerResult<MergeSummary> {
        let tx = store.transaction()?;
        let summary = self.apply_batch(&tx, records, now)?;
        tx.commit()?;
        Ok(summary)
    }
}
