use anyhow::{Result, anyhow};
use rusqlite::Connection;

use crate::OptionalExt;

pub const SEQ_USER: &str = "seq_user";
pub const SEQ_SESSION: &str = "seq_session";
pub const SEQ_REPORT: &str = "seq_report";
pub const SEQ_REPORT_MEDIA: &str = "seq_report_media";
pub const SEQ_REPORT_FEEDBACK: &str = "seq_report_feedback";

/// Advance `name` and return the new value.
///
/// Call inside the write transaction that consumes the id so a rollback also
/// rolls back the allocation.
pub fn next_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row(
        "UPDATE sequences SET value = value + 1 WHERE name = ?1 RETURNING value",
        [name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| anyhow!("Unknown sequence: {}", name))
}
