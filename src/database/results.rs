use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::ResultRow;

const RESULT_COLUMNS: &str =
    "id, match_id, submitter_id, winner_id, loser_id, score_text, disputed, created_at";

pub fn insert_result(
    conn: &Connection,
    match_id: i64,
    submitter_id: i64,
    winner_id: i64,
    loser_id: i64,
    score_text: &str,
) -> Result<ResultRow> {
    let sql = format!(
        "INSERT INTO results (match_id, submitter_id, winner_id, loser_id, score_text) VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {RESULT_COLUMNS}"
    );

    conn.query_row(
        &sql,
        params![match_id, submitter_id, winner_id, loser_id, score_text],
        parse_result_row,
    )
    .context("Failed to insert result")
}

fn parse_result_row(row: &rusqlite::Row) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        id: row.get(0)?,
        match_id: row.get(1)?,
        submitter_id: row.get(2)?,
        winner_id: row.get(3)?,
        loser_id: row.get(4)?,
        score_text: row.get(5)?,
        disputed: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn get_by_match(conn: &Connection, match_id: i64) -> Result<Option<ResultRow>> {
    let sql = format!("SELECT {RESULT_COLUMNS} FROM results WHERE match_id = ?1");
    conn.query_row(&sql, params![match_id], parse_result_row)
        .optional()
        .context("Failed to load result")
}

pub fn mark_disputed(conn: &Connection, result_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE results SET disputed = 1 WHERE id = ?1",
        params![result_id],
    )
    .context("Failed to mark result disputed")
    .map(|_| ())
}
