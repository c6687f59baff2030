use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use log::info;
use rusqlite::Connection;
use serde_json::json;

use crate::config::settings::AppConfig;
use crate::database::models::{ApplicationRow, MatchRow, SlotRow};
use crate::database::{applications, events, matches, ratings, slots, DbConn};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::{DomainEvent, EventType};
use crate::domain::models::{ApplicationStatus, MatchStatus, SlotStatus};

/// The administrative caller identity. Treated as just another acting user
/// id by the Forbidden checks.
pub const ADMIN_USER_ID: i64 = 0;

/// Re-derive a match's status from its slots. Terminal statuses stick;
/// completion is set explicitly by the result pipeline, never derived here.
pub fn refresh_match_status(conn: &Connection, match_id: i64) -> Result<MatchStatus> {
    let Some(row) = matches::get_match(conn, match_id)? else {
        anyhow::bail!("match {match_id} disappeared during status refresh");
    };
    if row.status.is_terminal() {
        return Ok(row.status);
    }

    let confirmed = slots::count_by_status(conn, match_id, SlotStatus::Confirmed)?;
    let live = slots::count_live(conn, match_id)?;
    let derived = if confirmed > 0 {
        MatchStatus::Confirmed
    } else if live == 0 {
        // Every slot reached cancelled (completed would have completed the
        // match already).
        MatchStatus::Cancelled
    } else {
        MatchStatus::Pending
    };

    if derived != row.status {
        matches::set_status(conn, match_id, derived)?;
        info!("match {match_id}: {} -> {}", row.status, derived);
    }
    Ok(derived)
}

pub struct NewMatchRequest<'a> {
    pub creator_id: i64,
    pub court_id: i64,
    pub date: NaiveDateTime,
    pub format: crate::domain::MatchFormat,
    pub skill_min: Option<f64>,
    pub skill_max: Option<f64>,
    pub gender_filter: Option<&'a str>,
    pub surface_filter: Option<&'a str>,
    pub max_distance_km: Option<f64>,
    pub slots: Vec<(NaiveDateTime, NaiveDateTime)>,
}

#[derive(Debug)]
pub struct MatchDetail {
    pub match_row: MatchRow,
    pub slots: Vec<(SlotRow, Vec<ApplicationRow>)>,
}

pub struct MatchLifecycle {
    config: AppConfig,
}

impl MatchLifecycle {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Create a match together with its slots; slots exist only as part of
    /// a match.
    pub fn create_match(
        &self,
        conn: &mut DbConn,
        request: &NewMatchRequest,
    ) -> DomainResult<MatchDetail> {
        if request.slots.is_empty() {
            return Err(DomainError::Validation("a match needs at least one slot".into()));
        }
        for (start, end) in &request.slots {
            if end <= start {
                return Err(DomainError::Validation(format!(
                    "slot end {end} is not after start {start}"
                )));
            }
        }

        let tx = conn.transaction().map_err(DomainError::Storage)?;
        let match_row = matches::insert_match(
            &tx,
            &matches::NewMatch {
                creator_id: request.creator_id,
                court_id: request.court_id,
                date: request.date,
                format: request.format,
                skill_min: request.skill_min,
                skill_max: request.skill_max,
                gender_filter: request.gender_filter,
                surface_filter: request.surface_filter,
                max_distance_km: request.max_distance_km,
            },
        )?;

        let mut slot_rows = Vec::with_capacity(request.slots.len());
        for (start, end) in &request.slots {
            let slot = slots::insert_slot(&tx, match_row.id, *start, *end)?;
            slot_rows.push((slot, Vec::new()));
        }
        ratings::ensure_user_stats(
            &tx,
            request.creator_id,
            self.config.rating.start_rating,
            Utc::now().naive_utc(),
        )?;
        tx.commit().map_err(DomainError::Storage)?;

        info!(
            "match {} created by user {} with {} slot(s)",
            match_row.id,
            request.creator_id,
            slot_rows.len()
        );
        Ok(MatchDetail {
            match_row,
            slots: slot_rows,
        })
    }

    pub fn get_match_detail(&self, conn: &Connection, match_id: i64) -> DomainResult<MatchDetail> {
        let match_row =
            matches::get_match(conn, match_id)?.ok_or(DomainError::NotFound("match"))?;
        let mut slot_rows = Vec::new();
        for slot in slots::list_by_match(conn, match_id)? {
            let apps = applications::list_by_slot(conn, slot.id)?;
            slot_rows.push((slot, apps));
        }
        Ok(MatchDetail {
            match_row,
            slots: slot_rows,
        })
    }

    /// A match is editable only while pending and before any slot has a
    /// confirmed application.
    pub fn check_editable(&self, conn: &Connection, match_id: i64) -> DomainResult<()> {
        let match_row =
            matches::get_match(conn, match_id)?.ok_or(DomainError::NotFound("match"))?;
        if match_row.status != MatchStatus::Pending {
            return Err(DomainError::EditNotAllowed);
        }
        for slot in slots::list_by_match(conn, match_id)? {
            if applications::count_confirmed(conn, slot.id)? > 0 {
                return Err(DomainError::EditNotAllowed);
            }
        }
        Ok(())
    }

    pub fn edit_match(
        &self,
        conn: &mut DbConn,
        match_id: i64,
        acting_user_id: i64,
        edit: &matches::MatchEdit,
    ) -> DomainResult<MatchRow> {
        let tx = conn.transaction().map_err(DomainError::Storage)?;
        let match_row =
            matches::get_match(&tx, match_id)?.ok_or(DomainError::NotFound("match"))?;
        if match_row.creator_id != acting_user_id {
            return Err(DomainError::Forbidden);
        }
        self.check_editable(&tx, match_id)?;
        matches::update_match(&tx, match_id, edit)?;
        let updated = matches::get_match(&tx, match_id)?.ok_or(DomainError::NotFound("match"))?;
        tx.commit().map_err(DomainError::Storage)?;
        Ok(updated)
    }

    /// Cancel every non-completed slot and reject every live application.
    /// Irreversible; calling it again is a no-op.
    pub fn force_cancel(
        &self,
        conn: &mut DbConn,
        match_id: i64,
        reason: &str,
        acting_user_id: i64,
    ) -> DomainResult<MatchRow> {
        let now = Utc::now().naive_utc();
        let tx = conn.transaction().map_err(DomainError::Storage)?;

        let match_row =
            matches::get_match(&tx, match_id)?.ok_or(DomainError::NotFound("match"))?;
        if acting_user_id != match_row.creator_id && acting_user_id != ADMIN_USER_ID {
            return Err(DomainError::Forbidden);
        }
        match match_row.status {
            MatchStatus::Cancelled => {
                // Second force-cancel: nothing left to do.
                return Ok(match_row);
            }
            MatchStatus::Completed => return Err(DomainError::EditNotAllowed),
            MatchStatus::Pending | MatchStatus::Confirmed => {}
        }

        let mut affected = vec![match_row.creator_id];
        for slot in slots::list_by_match(&tx, match_id)? {
            for app in applications::list_by_slot(&tx, slot.id)? {
                if app.status.is_live() {
                    applications::set_status(&tx, app.id, ApplicationStatus::Rejected, now)?;
                    affected.push(app.applicant_id);
                }
            }
            if !slot.status.is_terminal() {
                let version =
                    slots::get_slot(&tx, slot.id)?.ok_or(DomainError::NotFound("slot"))?.version;
                crate::database::slots::cas_set_status(
                    &tx,
                    slot.id,
                    version,
                    SlotStatus::Cancelled,
                )?;
            }
        }

        matches::set_cancelled(&tx, match_id, reason)?;
        affected.sort_unstable();
        affected.dedup();
        events::append_event(
            &tx,
            &DomainEvent::new(
                EventType::MatchForceCancelled,
                match_id,
                affected,
                json!({ "reason": reason }),
            ),
        )?;

        let updated = matches::get_match(&tx, match_id)?.ok_or(DomainError::NotFound("match"))?;
        tx.commit().map_err(DomainError::Storage)?;
        info!("match {match_id} force-cancelled by user {acting_user_id}: {reason}");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::domain::MatchFormat;
    use chrono::Duration;

    fn lifecycle() -> MatchLifecycle {
        MatchLifecycle::new(AppConfig::new())
    }

    fn setup_match(slot_count: usize) -> (database::DbPool, MatchDetail) {
        let pool = database::create_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            database::setup::init_schema(&conn).unwrap();
        }
        let mut conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();
        let slots = (0..slot_count)
            .map(|i| {
                let start = now + Duration::hours(i as i64);
                (start, start + Duration::hours(1))
            })
            .collect();
        let detail = lifecycle()
            .create_match(
                &mut conn,
                &NewMatchRequest {
                    creator_id: 1,
                    court_id: 10,
                    date: now,
                    format: MatchFormat::Singles,
                    skill_min: Some(3.0),
                    skill_max: Some(4.5),
                    gender_filter: None,
                    surface_filter: Some("clay"),
                    max_distance_km: None,
                    slots,
                },
            )
            .unwrap();
        (pool, detail)
    }

    #[test]
    fn create_match_requires_slots() {
        let pool = database::create_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            database::setup::init_schema(&conn).unwrap();
        }
        let mut conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();
        let err = lifecycle()
            .create_match(
                &mut conn,
                &NewMatchRequest {
                    creator_id: 1,
                    court_id: 10,
                    date: now,
                    format: MatchFormat::Singles,
                    skill_min: None,
                    skill_max: None,
                    gender_filter: None,
                    surface_filter: None,
                    max_distance_km: None,
                    slots: vec![],
                },
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn new_match_is_pending_and_editable() {
        let (pool, detail) = setup_match(2);
        let conn = pool.get().unwrap();
        assert_eq!(detail.match_row.status, MatchStatus::Pending);
        lifecycle().check_editable(&conn, detail.match_row.id).unwrap();
    }

    #[test]
    fn edit_is_creator_only() {
        let (pool, detail) = setup_match(1);
        let mut conn = pool.get().unwrap();
        let edit = matches::MatchEdit {
            court_id: 11,
            date: detail.match_row.date,
            skill_min: None,
            skill_max: None,
            gender_filter: None,
            surface_filter: None,
            max_distance_km: None,
        };
        let err = lifecycle()
            .edit_match(&mut conn, detail.match_row.id, 99, &edit)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));

        let updated = lifecycle()
            .edit_match(&mut conn, detail.match_row.id, 1, &edit)
            .unwrap();
        assert_eq!(updated.court_id, 11);
    }

    #[test]
    fn force_cancel_is_gated_and_idempotent() {
        let (pool, detail) = setup_match(2);
        let mut conn = pool.get().unwrap();
        let match_id = detail.match_row.id;

        let err = lifecycle()
            .force_cancel(&mut conn, match_id, "rain", 42)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));

        let cancelled = lifecycle()
            .force_cancel(&mut conn, match_id, "rain", ADMIN_USER_ID)
            .unwrap();
        assert_eq!(cancelled.status, MatchStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("rain"));

        for slot in database::slots::list_by_match(&conn, match_id).unwrap() {
            assert_eq!(slot.status, SlotStatus::Cancelled);
        }

        // Second call is a no-op, not an error.
        let again = lifecycle()
            .force_cancel(&mut conn, match_id, "rain again", ADMIN_USER_ID)
            .unwrap();
        assert_eq!(again.cancel_reason.as_deref(), Some("rain"));
    }

    #[test]
    fn cancelled_match_is_not_editable() {
        let (pool, detail) = setup_match(1);
        let mut conn = pool.get().unwrap();
        lifecycle()
            .force_cancel(&mut conn, detail.match_row.id, "no partner", 1)
            .unwrap();
        let err = lifecycle()
            .check_editable(&conn, detail.match_row.id)
            .unwrap_err();
        assert!(matches!(err, DomainError::EditNotAllowed));
    }
}
