use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::SlotRow;
use crate::domain::models::SlotStatus;

const SLOT_COLUMNS: &str = "id, match_id, start_time, end_time, status, locked_by_user_id, locked_at, expires_at, version, created_at";

pub fn insert_slot(
    conn: &Connection,
    match_id: i64,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
) -> Result<SlotRow> {
    let sql = format!(
        "INSERT INTO match_slots (match_id, start_time, end_time, status) VALUES (?1, ?2, ?3, ?4) RETURNING {SLOT_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![match_id, start_time, end_time, SlotStatus::Available],
        parse_slot_row,
    )
    .context("Failed to insert slot")
}

fn parse_slot_row(row: &rusqlite::Row) -> rusqlite::Result<SlotRow> {
    Ok(SlotRow {
        id: row.get(0)?,
        match_id: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        status: row.get(4)?,
        locked_by_user_id: row.get(5)?,
        locked_at: row.get(6)?,
        expires_at: row.get(7)?,
        version: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn get_slot(conn: &Connection, slot_id: i64) -> Result<Option<SlotRow>> {
    let sql = format!("SELECT {SLOT_COLUMNS} FROM match_slots WHERE id = ?1");
    conn.query_row(&sql, params![slot_id], parse_slot_row)
        .optional()
        .context("Failed to load slot")
}

pub fn list_by_match(conn: &Connection, match_id: i64) -> Result<Vec<SlotRow>> {
    let sql = format!(
        "SELECT {SLOT_COLUMNS} FROM match_slots WHERE match_id = ?1 ORDER BY start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![match_id], parse_slot_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Compare-and-swap on the slot's version counter: acquire or refresh the
/// lock hold. Returns false when the version moved underneath the caller.
pub fn cas_set_lock(
    conn: &Connection,
    slot_id: i64,
    expected_version: i64,
    user_id: i64,
    locked_at: NaiveDateTime,
    expires_at: NaiveDateTime,
) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE match_slots SET status = ?3, locked_by_user_id = ?4, locked_at = ?5, expires_at = ?6, version = version + 1 WHERE id = ?1 AND version = ?2",
            params![
                slot_id,
                expected_version,
                SlotStatus::Locked,
                user_id,
                locked_at,
                expires_at
            ],
        )
        .context("Failed to lock slot")?;
    Ok(updated == 1)
}

/// CAS transition to a status without a lock hold; clears the hold fields.
pub fn cas_set_status(
    conn: &Connection,
    slot_id: i64,
    expected_version: i64,
    status: SlotStatus,
) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE match_slots SET status = ?3, locked_by_user_id = NULL, locked_at = NULL, expires_at = NULL, version = version + 1 WHERE id = ?1 AND version = ?2",
            params![slot_id, expected_version, status],
        )
        .context("Failed to update slot status")?;
    Ok(updated == 1)
}

pub fn count_by_status(conn: &Connection, match_id: i64, status: SlotStatus) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM match_slots WHERE match_id = ?1 AND status = ?2",
        params![match_id, status],
        |row| row.get(0),
    )
    .context("Failed to count slots by status")
}

pub fn count_live(conn: &Connection, match_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM match_slots WHERE match_id = ?1 AND status NOT IN (?2, ?3)",
        params![match_id, SlotStatus::Completed, SlotStatus::Cancelled],
        |row| row.get(0),
    )
    .context("Failed to count live slots")
}
