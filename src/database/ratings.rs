use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{EloLogRow, UserStatsRow};
use crate::domain::models::MatchFormat;

const ELO_LOG_COLUMNS: &str =
    "id, user_id, match_id, match_type, elo_before, elo_after, created_at";
const USER_STATS_COLUMNS: &str = "user_id, singles_elo, doubles_elo, singles_streak, doubles_streak, total_matches, total_wins, total_losses, cancel_count, updated_at";

pub fn insert_elo_log(
    conn: &Connection,
    user_id: i64,
    match_id: i64,
    match_type: MatchFormat,
    elo_before: f64,
    elo_after: f64,
    now: NaiveDateTime,
) -> Result<EloLogRow> {
    let sql = format!(
        "INSERT INTO elo_log (user_id, match_id, match_type, elo_before, elo_after, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {ELO_LOG_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![user_id, match_id, match_type, elo_before, elo_after, now],
        parse_elo_log_row,
    )
    .context("Failed to insert elo log entry")
}

fn parse_elo_log_row(row: &rusqlite::Row) -> rusqlite::Result<EloLogRow> {
    Ok(EloLogRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        match_id: row.get(2)?,
        match_type: row.get(3)?,
        elo_before: row.get(4)?,
        elo_after: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn list_elo_log_for_user(conn: &Connection, user_id: i64) -> Result<Vec<EloLogRow>> {
    let sql = format!(
        "SELECT {ELO_LOG_COLUMNS} FROM elo_log WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], parse_elo_log_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_elo_log_for_match(conn: &Connection, match_id: i64) -> Result<Vec<EloLogRow>> {
    let sql = format!(
        "SELECT {ELO_LOG_COLUMNS} FROM elo_log WHERE match_id = ?1 ORDER BY id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![match_id], parse_elo_log_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn get_user_stats(conn: &Connection, user_id: i64) -> Result<Option<UserStatsRow>> {
    let sql = format!("SELECT {USER_STATS_COLUMNS} FROM user_stats WHERE user_id = ?1");
    conn.query_row(&sql, params![user_id], parse_user_stats_row)
        .optional()
        .context("Failed to load user stats")
}

fn parse_user_stats_row(row: &rusqlite::Row) -> rusqlite::Result<UserStatsRow> {
    Ok(UserStatsRow {
        user_id: row.get(0)?,
        singles_elo: row.get(1)?,
        doubles_elo: row.get(2)?,
        singles_streak: row.get(3)?,
        doubles_streak: row.get(4)?,
        total_matches: row.get(5)?,
        total_wins: row.get(6)?,
        total_losses: row.get(7)?,
        cancel_count: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Fetch the snapshot, creating a fresh one at the starting rating when the
/// user has no history yet.
pub fn ensure_user_stats(
    conn: &Connection,
    user_id: i64,
    start_rating: f64,
    now: NaiveDateTime,
) -> Result<UserStatsRow> {
    conn.execute(
        "INSERT OR IGNORE INTO user_stats (user_id, singles_elo, doubles_elo, updated_at) VALUES (?1, ?2, ?2, ?3)",
        params![user_id, start_rating, now],
    )
    .context("Failed to seed user stats")?;

    get_user_stats(conn, user_id)?
        .ok_or_else(|| anyhow::anyhow!("user stats missing after seed for user {user_id}"))
}

pub fn save_user_stats(conn: &Connection, stats: &UserStatsRow) -> Result<()> {
    conn.execute(
        "UPDATE user_stats SET singles_elo = ?2, doubles_elo = ?3, singles_streak = ?4, doubles_streak = ?5, total_matches = ?6, total_wins = ?7, total_losses = ?8, cancel_count = ?9, updated_at = ?10 WHERE user_id = ?1",
        params![
            stats.user_id,
            stats.singles_elo,
            stats.doubles_elo,
            stats.singles_streak,
            stats.doubles_streak,
            stats.total_matches,
            stats.total_wins,
            stats.total_losses,
            stats.cancel_count,
            stats.updated_at,
        ],
    )
    .context("Failed to save user stats")
    .map(|_| ())
}

pub fn increment_cancel_count(
    conn: &Connection,
    user_id: i64,
    start_rating: f64,
    now: NaiveDateTime,
) -> Result<()> {
    ensure_user_stats(conn, user_id, start_rating, now)?;
    conn.execute(
        "UPDATE user_stats SET cancel_count = cancel_count + 1, updated_at = ?2 WHERE user_id = ?1",
        params![user_id, now],
    )
    .context("Failed to increment cancel count")
    .map(|_| ())
}
