use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::MatchRow;
use crate::domain::models::{MatchFormat, MatchStatus};

const MATCH_COLUMNS: &str = "id, creator_id, court_id, date, format, skill_min, skill_max, gender_filter, surface_filter, max_distance_km, status, cancel_reason, created_at";

pub struct NewMatch<'a> {
    pub creator_id: i64,
    pub court_id: i64,
    pub date: NaiveDateTime,
    pub format: MatchFormat,
    pub skill_min: Option<f64>,
    pub skill_max: Option<f64>,
    pub gender_filter: Option<&'a str>,
    pub surface_filter: Option<&'a str>,
    pub max_distance_km: Option<f64>,
}

pub fn insert_match(conn: &Connection, new: &NewMatch) -> Result<MatchRow> {
    let sql = format!(
        "INSERT INTO matches (creator_id, court_id, date, format, skill_min, skill_max, gender_filter, surface_filter, max_distance_km, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) RETURNING {MATCH_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![
            new.creator_id,
            new.court_id,
            new.date,
            new.format,
            new.skill_min,
            new.skill_max,
            new.gender_filter,
            new.surface_filter,
            new.max_distance_km,
            MatchStatus::Pending,
        ],
        parse_match_row,
    )
    .context("Failed to insert match")
}

fn parse_match_row(row: &rusqlite::Row) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        court_id: row.get(2)?,
        date: row.get(3)?,
        format: row.get(4)?,
        skill_min: row.get(5)?,
        skill_max: row.get(6)?,
        gender_filter: row.get(7)?,
        surface_filter: row.get(8)?,
        max_distance_km: row.get(9)?,
        status: row.get(10)?,
        cancel_reason: row.get(11)?,
        created_at: row.get(12)?,
    })
}

pub fn get_match(conn: &Connection, match_id: i64) -> Result<Option<MatchRow>> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = ?1");
    conn.query_row(&sql, params![match_id], parse_match_row)
        .optional()
        .context("Failed to load match")
}

pub fn list_matches(conn: &Connection, status: Option<MatchStatus>) -> Result<Vec<MatchRow>> {
    let rows = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {MATCH_COLUMNS} FROM matches WHERE status = ?1 ORDER BY date ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![status], parse_match_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
        None => {
            let sql = format!("SELECT {MATCH_COLUMNS} FROM matches ORDER BY date ASC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], parse_match_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        }
    };
    Ok(rows)
}

pub fn set_status(conn: &Connection, match_id: i64, status: MatchStatus) -> Result<()> {
    conn.execute(
        "UPDATE matches SET status = ?2 WHERE id = ?1",
        params![match_id, status],
    )
    .context("Failed to update match status")
    .map(|_| ())
}

pub fn set_cancelled(conn: &Connection, match_id: i64, reason: &str) -> Result<()> {
    conn.execute(
        "UPDATE matches SET status = ?2, cancel_reason = ?3 WHERE id = ?1",
        params![match_id, MatchStatus::Cancelled, reason],
    )
    .context("Failed to cancel match")
    .map(|_| ())
}

pub struct MatchEdit<'a> {
    pub court_id: i64,
    pub date: NaiveDateTime,
    pub skill_min: Option<f64>,
    pub skill_max: Option<f64>,
    pub gender_filter: Option<&'a str>,
    pub surface_filter: Option<&'a str>,
    pub max_distance_km: Option<f64>,
}

pub fn update_match(conn: &Connection, match_id: i64, edit: &MatchEdit) -> Result<()> {
    conn.execute(
        "UPDATE matches SET court_id = ?2, date = ?3, skill_min = ?4, skill_max = ?5, gender_filter = ?6, surface_filter = ?7, max_distance_km = ?8 WHERE id = ?1",
        params![
            match_id,
            edit.court_id,
            edit.date,
            edit.skill_min,
            edit.skill_max,
            edit.gender_filter,
            edit.surface_filter,
            edit.max_distance_km,
        ],
    )
    .context("Failed to update match")
    .map(|_| ())
}
