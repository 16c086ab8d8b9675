use crate::{
    error::LedgerResult,
    ledger::{StatusTimes, TicketLedgerRow},
    status::CanonicalStatus,
    types::Minutes,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const SELECT_COLUMNS: &str = "ticket_no, module, label, priority,
    open_time, in_analysis_time, ready_for_testing_time,
    reopened_count, current_status, assignee, last_updated";

fn minutes_to_sql(m: Minutes) -> i64 {
    i64::try_from(m).unwrap_or(i64::MAX)
}

pub(super) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn ticket_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketLedgerRow> {
    let last_updated: String = row.get(10)?;
    Ok(TicketLedgerRow {
        ticket_no: row.get(0)?,
        module:    row.get(1)?,
        label:     row.get(2)?,
        priority:  row.get(3)?,
        status_time: StatusTimes {
            open:              row.get::<_, i64>(4)? as Minutes,
            in_analysis:       row.get::<_, i64>(5)? as Minutes,
            ready_for_testing: row.get::<_, i64>(6)? as Minutes,
        },
        reopened_count: row.get::<_, i64>(7)? as u32,
        current_status: CanonicalStatus::from_stored(row.get::<_, String>(8)?),
        assignee:       row.get(9)?,
        last_updated:   parse_timestamp(10, &last_updated)?,
    })
}

pub(super) fn select_ticket(conn: &Connection, ticket_no: &str) -> LedgerResult<Option<TicketLedgerRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM ticket_status_time WHERE ticket_no = ?1");
    Ok(conn
        .query_row(&sql, params![ticket_no], ticket_row_mapper)
        .optional()?)
}

pub(super) fn select_all_tickets(conn: &Connection) -> LedgerResult<Vec<TicketLedgerRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM ticket_status_time ORDER BY ticket_no ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], ticket_row_mapper)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub(super) fn count_tickets(conn: &Connection) -> LedgerResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM ticket_status_time", [], |row| row.get(0))?)
}

/// Insert if absent, else overwrite every column of the existing row.
pub(super) fn write_ticket(conn: &Connection, row: &TicketLedgerRow) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO ticket_status_time (
            ticket_no, module, label, priority,
            open_time, in_analysis_time, ready_for_testing_time,
            reopened_count, current_status, assignee, last_updated
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(ticket_no) DO UPDATE SET
            module                 = excluded.module,
            label                  = excluded.label,
            priority               = excluded.priority,
            open_time              = excluded.open_time,
            in_analysis_time       = excluded.in_analysis_time,
            ready_for_testing_time = excluded.ready_for_testing_time,
            reopened_count         = excluded.reopened_count,
            current_status         = excluded.current_status,
            assignee               = excluded.assignee,
            last_updated           = excluded.last_updated",
        params![
            &row.ticket_no,
            &row.module,
            &row.label,
            &row.priority,
            minutes_to_sql(row.status_time.open),
            minutes_to_sql(row.status_time.in_analysis),
            minutes_to_sql(row.status_time.ready_for_testing),
            row.reopened_count as i64,
            row.current_status.as_str(),
            &row.assignee,
            row.last_updated.to_rfc3339(),
        ],
    )?;
    Ok(())
}
