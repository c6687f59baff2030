use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use super::models::EventRow;
use crate::domain::events::{DomainEvent, EventType};

/// Append a logical event to the outbox. Runs inside the same transaction
/// as the state change it describes, so consumers never see an event for a
/// rolled-back mutation.
pub fn append_event(conn: &Connection, event: &DomainEvent) -> Result<i64> {
    let affected = serde_json::to_string(&event.affected_user_ids)
        .context("Failed to serialize affected user ids")?;
    let payload =
        serde_json::to_string(&event.payload).context("Failed to serialize event payload")?;

    conn.execute(
        "INSERT INTO events (event_type, match_id, affected_user_ids, payload) VALUES (?1, ?2, ?3, ?4)",
        params![event.event_type.as_str(), event.match_id, affected, payload],
    )
    .context("Failed to append event")?;

    Ok(conn.last_insert_rowid())
}

/// Whether an application-cancelled event was ever recorded for this
/// application. Distinguishes a repeat cancellation from an application
/// that was only ever rejected.
pub fn cancellation_recorded(
    conn: &Connection,
    match_id: i64,
    application_id: i64,
) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM events WHERE event_type = ?1 AND match_id = ?2 AND json_extract(payload, '$.application_id') = ?3",
            params![
                EventType::ApplicationCancelled.as_str(),
                match_id,
                application_id
            ],
            |row| row.get(0),
        )
        .context("Failed to look up cancellation events")?;
    Ok(count > 0)
}

pub fn list_events(conn: &Connection, after_id: i64, limit: usize) -> Result<Vec<EventRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, event_type, match_id, affected_user_ids, payload, created_at FROM events WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![after_id, limit as i64], parse_event_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_events_for_match(conn: &Connection, match_id: i64) -> Result<Vec<EventRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, event_type, match_id, affected_user_ids, payload, created_at FROM events WHERE match_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map(params![match_id], parse_event_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn parse_event_row(row: &rusqlite::Row) -> rusqlite::Result<EventRow> {
    let event_type_str: String = row.get(1)?;
    let affected_str: String = row.get(3)?;
    let payload_str: String = row.get(4)?;

    let event_type: EventType = serde_json::from_value(serde_json::Value::String(
        event_type_str,
    ))
    .map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let affected_user_ids: Vec<i64> = serde_json::from_str(&affected_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let payload: serde_json::Value = serde_json::from_str(&payload_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(EventRow {
        id: row.get(0)?,
        event_type,
        match_id: row.get(2)?,
        affected_user_ids,
        payload,
        created_at: row.get(5)?,
    })
}
