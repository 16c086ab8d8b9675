//! SQLite persistence layer for the status-time ledger.
//!
//! RULE: Only the store talks to the database.
//! The merge and verdict engines call store methods and never execute SQL directly.
//!
//! The single mutation primitive is `upsert`: an atomic read-modify-write of
//! one ticket row. Batches go through `LedgerTx`, which rolls back on drop
//! unless `commit` is called.

use crate::{error::LedgerResult, ledger::TicketLedgerRow};
use rusqlite::{Connection, Transaction};

mod merge_run;
mod ticket;

pub use merge_run::MergeRunRecord;

/// Result of one upsert: the row as it was before, and as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub prior: Option<TicketLedgerRow>,
    pub row:   TicketLedgerRow,
}

impl Upserted {
    pub fn inserted(&self) -> bool {
        self.prior.is_none()
    }
}

pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Safe to call on every run.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_ledger.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_merge_run.sql"))?;
        Ok(())
    }

    // ── Ledger ─────────────────────────────────────────────────

    pub fn get(&self, ticket_no: &str) -> LedgerResult<Option<TicketLedgerRow>> {
        ticket::select_ticket(&self.conn, ticket_no)
    }

    /// Upsert one row in its own transaction.
    pub fn upsert<F>(&mut self, ticket_no: &str, mutation: F) -> LedgerResult<Upserted>
    where
        F: FnOnce(Option<&TicketLedgerRow>) -> TicketLedgerRow,
    {
        let tx = self.transaction()?;
        let out = tx.upsert(ticket_no, mutation)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn all_rows(&self) -> LedgerResult<Vec<TicketLedgerRow>> {
        ticket::select_all_tickets(&self.conn)
    }

    pub fn row_count(&self) -> LedgerResult<i64> {
        ticket::count_tickets(&self.conn)
    }

    // ── Run log ────────────────────────────────────────────────

    pub fn merge_runs(&self) -> LedgerResult<Vec<MergeRunRecord>> {
        merge_run::select_merge_runs(&self.conn)
    }

    // ── Transactions ───────────────────────────────────────────

    /// Begin an all-or-nothing batch. Dropping the handle without
    /// `commit` rolls back every mutation made through it.
    pub fn transaction(&mut self) -> LedgerResult<LedgerTx<'_>> {
        Ok(LedgerTx {
            tx: self.conn.transaction()?,
        })
    }
}

pub struct LedgerTx<'a> {
    tx: Transaction<'a>,
}

impl LedgerTx<'_> {
    pub fn get(&self, ticket_no: &str) -> LedgerResult<Option<TicketLedgerRow>> {
        ticket::select_ticket(&self.tx, ticket_no)
    }

    /// Read the current row (if any), hand it to `mutation`, write the result.
    ///
    /// The mutation must keep the ticket key; a row for a different key is
    /// rejected so one call can never touch two tickets.
    pub fn upsert<F>(&self, ticket_no: &str, mutation: F) -> LedgerResult<Upserted>
    where
        F: FnOnce(Option<&TicketLedgerRow>) -> TicketLedgerRow,
    {
        let prior = ticket::select_ticket(&self.tx, ticket_no)?;
        let row = mutation(prior.as_ref());
        if row.ticket_no != ticket_no {
            return Err(anyhow::anyhow!(
                "upsert for '{ticket_no}' produced a row keyed '{}'",
                row.ticket_no
            )
            .into());
        }
        ticket::write_ticket(&self.tx, &row)?;
        Ok(Upserted { prior, row })
    }

    pub fn all_rows(&self) -> LedgerResult<Vec<TicketLedgerRow>> {
        ticket::select_all_tickets(&self.tx)
    }

    pub fn record_run(&self, record: &MergeRunRecord) -> LedgerResult<()> {
        merge_run::insert_merge_run(&self.tx, record)
    }

    pub fn commit(self) -> LedgerResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}
