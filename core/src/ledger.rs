//! The ledger row and its per-status accumulators.

use crate::{
    status::{CanonicalStatus, TrackedStatus},
    types::{Minutes, TicketKey},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative time per tracked status. Values only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimes {
    pub open:              Minutes,
    pub in_analysis:       Minutes,
    pub ready_for_testing: Minutes,
}

impl StatusTimes {
    pub fn get(&self, status: TrackedStatus) -> Minutes {
        match status {
            TrackedStatus::Open            => self.open,
            TrackedStatus::InAnalysis      => self.in_analysis,
            TrackedStatus::ReadyForTesting => self.ready_for_testing,
        }
    }

    /// Add `quantum` to one bucket. Saturates instead of wrapping.
    pub fn credit(&mut self, status: TrackedStatus, quantum: Minutes) {
        let slot = match status {
            TrackedStatus::Open            => &mut self.open,
            TrackedStatus::InAnalysis      => &mut self.in_analysis,
            TrackedStatus::ReadyForTesting => &mut self.ready_for_testing,
        };
        *slot = slot.saturating_add(quantum);
    }

    /// True when no bucket is smaller than in `earlier`.
    pub fn dominates(&self, earlier: &StatusTimes) -> bool {
        TrackedStatus::ALL
            .into_iter()
            .all(|s| self.get(s) >= earlier.get(s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLedgerRow {
    pub ticket_no:      TicketKey,
    pub module:         String,
    pub label:          String,
    pub priority:       String,
    pub status_time:    StatusTimes,
    pub reopened_count: u32,
    pub current_status: CanonicalStatus,
    pub assignee:       String,
    pub last_updated:   DateTime<Utc>,
}

impl TicketLedgerRow {
    /// Time accrued in the ticket's current status, if that status is tracked.
    pub fn time_in_current_status(&self) -> Option<(TrackedStatus, Minutes)> {
        let status = self.current_status.tracked()?;
        Some((status, self.status_time.get(status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_touches_only_one_bucket() {
        let mut t = StatusTimes::default();
        t.credit(TrackedStatus::InAnalysis, 15);
        t.credit(TrackedStatus::InAnalysis, 15);
        assert_eq!(
            t,
            StatusTimes { open: 0, in_analysis: 30, ready_for_testing: 0 }
        );
    }

    #[test]
    fn credit_saturates() {
        let mut t = StatusTimes { open: Minutes::MAX - 1, ..Default::default() };
        t.credit(TrackedStatus::Open, 15);
        assert_eq!(t.open, Minutes::MAX);
    }

    #[test]
    fn dominates_compares_every_bucket() {
        let a = StatusTimes { open: 15, in_analysis: 0, ready_for_testing: 30 };
        let b = StatusTimes { open: 15, in_analysis: 15, ready_for_testing: 15 };
        assert!(!b.dominates(&a));
        assert!(!a.dominates(&b));
        assert!(a.dominates(&a));
    }
}
