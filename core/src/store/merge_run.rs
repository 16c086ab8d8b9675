use super::ticket::parse_timestamp;
use crate::{error::LedgerResult, types::RunId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// Summary of one committed merge run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRunRecord {
    pub run_id:             RunId,
    pub started_at:         DateTime<Utc>,
    pub committed_at:       DateTime<Utc>,
    pub records:            u64,
    pub inserted:           u64,
    pub updated:            u64,
    pub reopen_transitions: u64,
}

pub(super) fn insert_merge_run(conn: &Connection, r: &MergeRunRecord) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO merge_run (
            run_id, started_at, committed_at, records, inserted, updated, reopen_transitions
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &r.run_id,
            r.started_at.to_rfc3339(),
            r.committed_at.to_rfc3339(),
            r.records as i64,
            r.inserted as i64,
            r.updated as i64,
            r.reopen_transitions as i64,
        ],
    )?;
    Ok(())
}

pub(super) fn select_merge_runs(conn: &Connection) -> LedgerResult<Vec<MergeRunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, started_at, committed_at, records, inserted, updated, reopen_transitions
         FROM merge_run ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        let started: String = row.get(1)?;
        let committed: String = row.get(2)?;
        Ok(MergeRunRecord {
            run_id:             row.get(0)?,
            started_at:         parse_timestamp(1, &started)?,
            committed_at:       parse_timestamp(2, &committed)?,
            records:            row.get::<_, i64>(3)? as u64,
            inserted:           row.get::<_, i64>(4)? as u64,
            updated:            row.get::<_, i64>(5)? as u64,
            reopen_transitions: row.get::<_, i64>(6)? as u64,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}
