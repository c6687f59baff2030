use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::ApplicationRow;
use crate::domain::models::ApplicationStatus;

const APPLICATION_COLUMNS: &str =
    "id, slot_id, applicant_id, guest_partner_name, status, created_at, updated_at";

pub fn insert_application(
    conn: &Connection,
    slot_id: i64,
    applicant_id: i64,
    guest_partner_name: Option<&str>,
    status: ApplicationStatus,
    now: NaiveDateTime,
) -> Result<ApplicationRow> {
    let sql = format!(
        "INSERT INTO applications (slot_id, applicant_id, guest_partner_name, status, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5) RETURNING {APPLICATION_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![slot_id, applicant_id, guest_partner_name, status, now],
        parse_application_row,
    )
    .context("Failed to insert application")
}

fn parse_application_row(row: &rusqlite::Row) -> rusqlite::Result<ApplicationRow> {
    Ok(ApplicationRow {
        id: row.get(0)?,
        slot_id: row.get(1)?,
        applicant_id: row.get(2)?,
        guest_partner_name: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn get_application(conn: &Connection, application_id: i64) -> Result<Option<ApplicationRow>> {
    let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1");
    conn.query_row(&sql, params![application_id], parse_application_row)
        .optional()
        .context("Failed to load application")
}

pub fn list_by_slot(conn: &Connection, slot_id: i64) -> Result<Vec<ApplicationRow>> {
    let sql = format!(
        "SELECT {APPLICATION_COLUMNS} FROM applications WHERE slot_id = ?1 ORDER BY created_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![slot_id], parse_application_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn find_by_slot_and_status(
    conn: &Connection,
    slot_id: i64,
    status: ApplicationStatus,
) -> Result<Vec<ApplicationRow>> {
    let sql = format!(
        "SELECT {APPLICATION_COLUMNS} FROM applications WHERE slot_id = ?1 AND status = ?2 ORDER BY created_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![slot_id, status], parse_application_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Oldest waitlisted application for a slot, the promotion candidate.
pub fn oldest_waitlisted(conn: &Connection, slot_id: i64) -> Result<Option<ApplicationRow>> {
    let sql = format!(
        "SELECT {APPLICATION_COLUMNS} FROM applications WHERE slot_id = ?1 AND status = ?2 ORDER BY created_at ASC, id ASC LIMIT 1"
    );
    conn.query_row(
        &sql,
        params![slot_id, ApplicationStatus::Waitlisted],
        parse_application_row,
    )
    .optional()
    .context("Failed to find oldest waitlisted application")
}

pub fn find_live_by_slot_and_applicant(
    conn: &Connection,
    slot_id: i64,
    applicant_id: i64,
) -> Result<Option<ApplicationRow>> {
    let sql = format!(
        "SELECT {APPLICATION_COLUMNS} FROM applications WHERE slot_id = ?1 AND applicant_id = ?2 AND status IN (?3, ?4, ?5) ORDER BY created_at ASC, id ASC LIMIT 1"
    );
    conn.query_row(
        &sql,
        params![
            slot_id,
            applicant_id,
            ApplicationStatus::Pending,
            ApplicationStatus::Confirmed,
            ApplicationStatus::Waitlisted
        ],
        parse_application_row,
    )
    .optional()
    .context("Failed to look up live application")
}

pub fn set_status(
    conn: &Connection,
    application_id: i64,
    status: ApplicationStatus,
    now: NaiveDateTime,
) -> Result<()> {
    conn.execute(
        "UPDATE applications SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![application_id, status, now],
    )
    .context("Failed to update application status")
    .map(|_| ())
}

/// Reject every live sibling of `except_id` on the slot. Returns the rows
/// that were moved, for event fan-out.
pub fn reject_siblings(
    conn: &Connection,
    slot_id: i64,
    except_id: i64,
    now: NaiveDateTime,
) -> Result<Vec<ApplicationRow>> {
    let sql = format!(
        "SELECT {APPLICATION_COLUMNS} FROM applications WHERE slot_id = ?1 AND id != ?2 AND status IN (?3, ?4)"
    );
    let mut stmt = conn.prepare(&sql)?;
    let siblings = stmt
        .query_map(
            params![
                slot_id,
                except_id,
                ApplicationStatus::Pending,
                ApplicationStatus::Waitlisted
            ],
            parse_application_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    conn.execute(
        "UPDATE applications SET status = ?3, updated_at = ?4 WHERE slot_id = ?1 AND id != ?2 AND status IN (?5, ?6)",
        params![
            slot_id,
            except_id,
            ApplicationStatus::Rejected,
            now,
            ApplicationStatus::Pending,
            ApplicationStatus::Waitlisted
        ],
    )
    .context("Failed to reject sibling applications")?;

    Ok(siblings)
}

/// Pending applications on slots whose lock hold has already lapsed.
pub fn list_stale_pending(conn: &Connection, now: NaiveDateTime) -> Result<Vec<ApplicationRow>> {
    let sql = format!(
        "SELECT {cols} FROM applications a JOIN match_slots s ON a.slot_id = s.id WHERE a.status = ?1 AND s.status = 'locked' AND s.expires_at IS NOT NULL AND s.expires_at <= ?2",
        cols = "a.id, a.slot_id, a.applicant_id, a.guest_partner_name, a.status, a.created_at, a.updated_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![ApplicationStatus::Pending, now], parse_application_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Invariant check used by the property tests: a slot never carries more
/// than one confirmed application.
pub fn count_confirmed(conn: &Connection, slot_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM applications WHERE slot_id = ?1 AND status = ?2",
        params![slot_id, ApplicationStatus::Confirmed],
        |row| row.get(0),
    )
    .context("Failed to count confirmed applications")
}
