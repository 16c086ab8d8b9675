//! Shared primitive types used across the ledger.

/// The tracker's unique ticket key, e.g. `DEV-42`.
pub type TicketKey = String;

/// Accumulated time, in the same unit as the poll quantum (minutes).
pub type Minutes = u64;

/// Identifier of one committed merge run.
pub type RunId = String;

/// Assignee recorded when the tracker reports none.
pub const UNASSIGNED: &str = "Unassigned";
