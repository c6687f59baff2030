use chrono::{NaiveDateTime, Utc};
use log::info;
use rusqlite::Connection;
use serde_json::json;

use super::lifecycle::refresh_match_status;
use super::slot_store::SlotStore;
use crate::config::settings::AppConfig;
use crate::database::models::{ApplicationRow, MatchRow, SlotRow};
use crate::database::{applications, events, matches, ratings, slots, DbConn};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::{DomainEvent, EventType};
use crate::domain::models::{ApplicationStatus, SlotStatus};

/// Exclusivity and waitlist logic layered on the Slot Store. Every public
/// operation runs as one transaction: a failure partway through leaves the
/// previous consistent state intact.
pub struct ApplicationEngine {
    slot_store: SlotStore,
    start_rating: f64,
}

impl ApplicationEngine {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            slot_store: SlotStore::new(config.slots.clone()),
            start_rating: config.rating.start_rating,
        }
    }

    /// Apply for a slot. The first applicant to acquire the hold becomes
    /// `pending`; everyone else lands on the waitlist, which is an expected
    /// outcome and not an error. Re-submission by the current holder
    /// refreshes the hold and returns the existing application.
    pub fn apply(
        &self,
        conn: &mut DbConn,
        slot_id: i64,
        applicant_id: i64,
        guest_partner_name: Option<&str>,
    ) -> DomainResult<ApplicationRow> {
        let now = Utc::now().naive_utc();
        let tx = conn.transaction().map_err(DomainError::Storage)?;
        self.expire_stale_in(&tx, now)?;

        let slot = slots::get_slot(&tx, slot_id)?.ok_or(DomainError::NotFound("slot"))?;
        let match_row =
            matches::get_match(&tx, slot.match_id)?.ok_or(DomainError::NotFound("match"))?;
        if match_row.creator_id == applicant_id {
            return Err(DomainError::Forbidden);
        }
        if match_row.status.is_terminal() {
            return Err(DomainError::SlotUnavailable);
        }

        if let Some(existing) =
            applications::find_live_by_slot_and_applicant(&tx, slot_id, applicant_id)?
        {
            let updated = match existing.status {
                ApplicationStatus::Pending if slot.held_by(applicant_id, now) => {
                    self.slot_store.try_lock_from(&tx, &slot, applicant_id, now)?;
                    existing
                }
                // A reopened slot promotes the returning waitlisted
                // applicant instead of handing back the stale entry.
                ApplicationStatus::Waitlisted
                    if slot.effective_status(now) == SlotStatus::Available =>
                {
                    match self.slot_store.try_lock_from(&tx, &slot, applicant_id, now) {
                        Ok(_) => {
                            applications::set_status(
                                &tx,
                                existing.id,
                                ApplicationStatus::Pending,
                                now,
                            )?;
                            applications::get_application(&tx, existing.id)?
                                .ok_or(DomainError::NotFound("application"))?
                        }
                        Err(DomainError::SlotUnavailable) => existing,
                        Err(e) => return Err(e),
                    }
                }
                _ => existing,
            };
            tx.commit().map_err(DomainError::Storage)?;
            return Ok(updated);
        }

        let status = self.lock_or_waitlist(&tx, &slot, applicant_id, now)?;

        let application = applications::insert_application(
            &tx,
            slot_id,
            applicant_id,
            guest_partner_name,
            status,
            now,
        )?;
        ratings::ensure_user_stats(&tx, applicant_id, self.start_rating, now)?;

        events::append_event(
            &tx,
            &DomainEvent::new(
                EventType::SlotApply,
                match_row.id,
                vec![match_row.creator_id, applicant_id],
                json!({
                    "slot_id": slot_id,
                    "application_id": application.id,
                    "status": application.status,
                }),
            ),
        )?;

        tx.commit().map_err(DomainError::Storage)?;
        info!(
            "user {applicant_id} applied to slot {slot_id} as {}",
            application.status
        );
        Ok(application)
    }

    /// Creator confirms one application; all competing applications on the
    /// slot are rejected in the same transaction.
    pub fn confirm_application(
        &self,
        conn: &mut DbConn,
        application_id: i64,
        acting_user_id: i64,
    ) -> DomainResult<ApplicationRow> {
        let now = Utc::now().naive_utc();
        let tx = conn.transaction().map_err(DomainError::Storage)?;
        self.expire_stale_in(&tx, now)?;

        let (application, slot, match_row) = self.load_context(&tx, application_id)?;
        if match_row.creator_id != acting_user_id {
            return Err(DomainError::Forbidden);
        }
        if applications::count_confirmed(&tx, slot.id)? > 0
            || slot.status == SlotStatus::Confirmed
        {
            return Err(DomainError::AlreadyConfirmed);
        }
        if !matches!(
            application.status,
            ApplicationStatus::Pending | ApplicationStatus::Waitlisted
        ) {
            return Err(DomainError::SlotUnavailable);
        }

        // A waitlisted confirmation may find the slot unheld (or held by a
        // sibling about to be rejected); take the hold for the chosen
        // applicant before confirming.
        if slot.effective_status(now) == SlotStatus::Available {
            self.slot_store
                .try_lock(&tx, slot.id, application.applicant_id, now)?;
        }
        self.slot_store.confirm(&tx, slot.id, now)?;

        applications::set_status(&tx, application_id, ApplicationStatus::Confirmed, now)?;
        let rejected = applications::reject_siblings(&tx, slot.id, application_id, now)?;
        refresh_match_status(&tx, match_row.id)?;

        events::append_event(
            &tx,
            &DomainEvent::new(
                EventType::ApplicationConfirmed,
                match_row.id,
                vec![match_row.creator_id, application.applicant_id],
                json!({ "slot_id": slot.id, "application_id": application_id }),
            ),
        )?;
        if !rejected.is_empty() {
            events::append_event(
                &tx,
                &DomainEvent::new(
                    EventType::ApplicationRejected,
                    match_row.id,
                    rejected.iter().map(|a| a.applicant_id).collect(),
                    json!({
                        "slot_id": slot.id,
                        "application_ids": rejected.iter().map(|a| a.id).collect::<Vec<_>>(),
                    }),
                ),
            )?;
        }

        let confirmed = applications::get_application(&tx, application_id)?
            .ok_or(DomainError::NotFound("application"))?;
        tx.commit().map_err(DomainError::Storage)?;
        info!(
            "application {application_id} confirmed on slot {} ({} sibling(s) rejected)",
            slot.id,
            rejected.len()
        );
        Ok(confirmed)
    }

    /// Creator rejects a pending/waitlisted application; the hold is
    /// released if the rejected applicant held it.
    pub fn reject_application(
        &self,
        conn: &mut DbConn,
        application_id: i64,
        acting_user_id: i64,
    ) -> DomainResult<ApplicationRow> {
        let now = Utc::now().naive_utc();
        let tx = conn.transaction().map_err(DomainError::Storage)?;
        self.expire_stale_in(&tx, now)?;

        let (application, slot, match_row) = self.load_context(&tx, application_id)?;
        if match_row.creator_id != acting_user_id {
            return Err(DomainError::Forbidden);
        }
        if !matches!(
            application.status,
            ApplicationStatus::Pending | ApplicationStatus::Waitlisted
        ) {
            return Err(DomainError::SlotUnavailable);
        }

        applications::set_status(&tx, application_id, ApplicationStatus::Rejected, now)?;
        self.slot_store
            .release_lock(&tx, slot.id, application.applicant_id)?;

        events::append_event(
            &tx,
            &DomainEvent::new(
                EventType::ApplicationRejected,
                match_row.id,
                vec![application.applicant_id],
                json!({ "slot_id": slot.id, "application_ids": [application_id] }),
            ),
        )?;

        let rejected = applications::get_application(&tx, application_id)?
            .ok_or(DomainError::NotFound("application"))?;
        tx.commit().map_err(DomainError::Storage)?;
        Ok(rejected)
    }

    /// Either participant backs out of a confirmed pairing before the match
    /// is played. The slot reopens and the oldest waitlisted application is
    /// promoted to pending, synchronously. Calling it again for the same
    /// application is a no-op.
    pub fn cancel_confirmed_application(
        &self,
        conn: &mut DbConn,
        application_id: i64,
        acting_user_id: i64,
    ) -> DomainResult<()> {
        let now = Utc::now().naive_utc();
        let tx = conn.transaction().map_err(DomainError::Storage)?;

        let (application, slot, match_row) = self.load_context(&tx, application_id)?;
        if acting_user_id != application.applicant_id
            && acting_user_id != match_row.creator_id
        {
            return Err(DomainError::Forbidden);
        }
        match application.status {
            ApplicationStatus::Confirmed => {}
            // A repeat cancellation is a no-op; a rejection that never
            // went through confirmation is a conflict, not a success.
            ApplicationStatus::Rejected => {
                return if events::cancellation_recorded(&tx, match_row.id, application_id)? {
                    Ok(())
                } else {
                    Err(DomainError::SlotUnavailable)
                };
            }
            _ => return Err(DomainError::SlotUnavailable),
        }
        if slot.status == SlotStatus::Completed {
            return Err(DomainError::EditNotAllowed);
        }

        applications::set_status(&tx, application_id, ApplicationStatus::Rejected, now)?;
        self.slot_store.reopen(&tx, slot.id, now)?;
        ratings::increment_cancel_count(&tx, acting_user_id, self.start_rating, now)?;

        let promoted = self.promote_oldest_waitlisted(&tx, slot.id, now)?;

        let mut affected = vec![match_row.creator_id, application.applicant_id];
        if let Some(promoted) = &promoted {
            affected.push(promoted.applicant_id);
        }
        events::append_event(
            &tx,
            &DomainEvent::new(
                EventType::ApplicationCancelled,
                match_row.id,
                affected,
                json!({
                    "slot_id": slot.id,
                    "application_id": application_id,
                    "promoted_application_id": promoted.as_ref().map(|a| a.id),
                }),
            ),
        )?;

        refresh_match_status(&tx, match_row.id)?;
        tx.commit().map_err(DomainError::Storage)?;
        info!(
            "confirmed application {application_id} cancelled by user {acting_user_id}; promoted: {:?}",
            promoted.as_ref().map(|a| a.id)
        );
        Ok(())
    }

    /// Initial status for a fresh application, decided against the slot
    /// row the caller read. Losing the version race between that read and
    /// the lock's compare-and-swap is the normal path to the waitlist.
    fn lock_or_waitlist(
        &self,
        conn: &Connection,
        slot: &SlotRow,
        applicant_id: i64,
        now: NaiveDateTime,
    ) -> DomainResult<ApplicationStatus> {
        match slot.effective_status(now) {
            SlotStatus::Available => {
                match self.slot_store.try_lock_from(conn, slot, applicant_id, now) {
                    Ok(_) => Ok(ApplicationStatus::Pending),
                    Err(DomainError::SlotUnavailable) => Ok(ApplicationStatus::Waitlisted),
                    Err(e) => Err(e),
                }
            }
            SlotStatus::Locked | SlotStatus::Confirmed => Ok(ApplicationStatus::Waitlisted),
            SlotStatus::Completed | SlotStatus::Cancelled => Err(DomainError::SlotUnavailable),
        }
    }

    /// Best-effort waitlist promotion: the oldest waitlisted application
    /// takes the hold and becomes pending. Idempotent; promoting on a slot
    /// that is no longer open does nothing.
    fn promote_oldest_waitlisted(
        &self,
        conn: &Connection,
        slot_id: i64,
        now: NaiveDateTime,
    ) -> DomainResult<Option<ApplicationRow>> {
        let Some(candidate) = applications::oldest_waitlisted(conn, slot_id)? else {
            return Ok(None);
        };
        let slot = slots::get_slot(conn, slot_id)?.ok_or(DomainError::NotFound("slot"))?;
        if slot.effective_status(now) != SlotStatus::Available {
            return Ok(None);
        }
        self.slot_store
            .try_lock(conn, slot_id, candidate.applicant_id, now)?;
        applications::set_status(conn, candidate.id, ApplicationStatus::Pending, now)?;
        Ok(applications::get_application(conn, candidate.id)?)
    }

    /// Lazily expire pending applications whose slot hold has lapsed. Also
    /// exposed as a public operation so a janitor can call it eagerly; that
    /// is an optimization, not a correctness requirement.
    pub fn expire_stale_applications(&self, conn: &mut DbConn) -> DomainResult<usize> {
        let now = Utc::now().naive_utc();
        let tx = conn.transaction().map_err(DomainError::Storage)?;
        let expired = self.expire_stale_in(&tx, now)?;
        tx.commit().map_err(DomainError::Storage)?;
        Ok(expired)
    }

    fn expire_stale_in(&self, conn: &Connection, now: NaiveDateTime) -> DomainResult<usize> {
        let stale = applications::list_stale_pending(conn, now)?;
        for application in &stale {
            applications::set_status(conn, application.id, ApplicationStatus::Expired, now)?;
            let slot =
                slots::get_slot(conn, application.slot_id)?.ok_or(DomainError::NotFound("slot"))?;
            if slot.status == SlotStatus::Locked && slot.lock_expired(now) {
                slots::cas_set_status(conn, slot.id, slot.version, SlotStatus::Available)?;
            }
        }
        if !stale.is_empty() {
            info!("expired {} stale application(s)", stale.len());
        }
        Ok(stale.len())
    }

    fn load_context(
        &self,
        conn: &Connection,
        application_id: i64,
    ) -> DomainResult<(ApplicationRow, SlotRow, MatchRow)> {
        let application = applications::get_application(conn, application_id)?
            .ok_or(DomainError::NotFound("application"))?;
        let slot =
            slots::get_slot(conn, application.slot_id)?.ok_or(DomainError::NotFound("slot"))?;
        let match_row =
            matches::get_match(conn, slot.match_id)?.ok_or(DomainError::NotFound("match"))?;
        Ok((application, slot, match_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::domain::models::{MatchFormat, MatchStatus};
    use crate::services::lifecycle::{MatchLifecycle, NewMatchRequest};
    use chrono::Duration;

    struct Fixture {
        pool: database::DbPool,
        match_id: i64,
        slot_id: i64,
    }

    const CREATOR: i64 = 1;

    fn fixture() -> Fixture {
        let pool = database::create_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            database::setup::init_schema(&conn).unwrap();
        }
        let mut conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();
        let detail = MatchLifecycle::new(AppConfig::new())
            .create_match(
                &mut conn,
                &NewMatchRequest {
                    creator_id: CREATOR,
                    court_id: 10,
                    date: now,
                    format: MatchFormat::Singles,
                    skill_min: None,
                    skill_max: None,
                    gender_filter: None,
                    surface_filter: None,
                    max_distance_km: None,
                    slots: vec![(now, now + Duration::hours(1))],
                },
            )
            .unwrap();
        drop(conn);
        Fixture {
            pool,
            match_id: detail.match_row.id,
            slot_id: detail.slots[0].0.id,
        }
    }

    fn engine() -> ApplicationEngine {
        ApplicationEngine::new(&AppConfig::new())
    }

    #[test]
    fn first_applicant_is_pending_rest_are_waitlisted() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();

        let mut statuses = Vec::new();
        for user in 2..=6 {
            let app = engine.apply(&mut conn, fx.slot_id, user, None).unwrap();
            statuses.push(app.status);
        }

        let pending = statuses
            .iter()
            .filter(|s| **s == ApplicationStatus::Pending)
            .count();
        let waitlisted = statuses
            .iter()
            .filter(|s| **s == ApplicationStatus::Waitlisted)
            .count();
        assert_eq!(pending, 1);
        assert_eq!(waitlisted, 4);
        assert_eq!(statuses[0], ApplicationStatus::Pending);
    }

    #[test]
    fn creator_cannot_apply_to_own_slot() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let err = engine()
            .apply(&mut conn, fx.slot_id, CREATOR, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
    }

    #[test]
    fn resubmission_returns_the_same_application() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();

        let first = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        let second = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        assert_eq!(first.id, second.id);

        let all = database::applications::list_by_slot(&conn, fx.slot_id).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn confirm_rejects_all_siblings_atomically() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();

        let chosen = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        for user in 3..=5 {
            engine.apply(&mut conn, fx.slot_id, user, None).unwrap();
        }

        let confirmed = engine
            .confirm_application(&mut conn, chosen.id, CREATOR)
            .unwrap();
        assert_eq!(confirmed.status, ApplicationStatus::Confirmed);

        let all = database::applications::list_by_slot(&conn, fx.slot_id).unwrap();
        for app in &all {
            if app.id == chosen.id {
                assert_eq!(app.status, ApplicationStatus::Confirmed);
            } else {
                assert_eq!(app.status, ApplicationStatus::Rejected);
            }
        }
        assert_eq!(
            database::applications::count_confirmed(&conn, fx.slot_id).unwrap(),
            1
        );

        let slot = database::slots::get_slot(&conn, fx.slot_id).unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Confirmed);
        let match_row = database::matches::get_match(&conn, fx.match_id)
            .unwrap()
            .unwrap();
        assert_eq!(match_row.status, MatchStatus::Confirmed);
    }

    #[test]
    fn confirm_is_creator_only() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();
        let app = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        let err = engine
            .confirm_application(&mut conn, app.id, 2)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
    }

    #[test]
    fn second_confirmation_loses_with_already_confirmed() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();
        let a = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        let b = engine.apply(&mut conn, fx.slot_id, 3, None).unwrap();

        engine.confirm_application(&mut conn, a.id, CREATOR).unwrap();
        let err = engine
            .confirm_application(&mut conn, b.id, CREATOR)
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyConfirmed));
    }

    #[test]
    fn applying_to_a_confirmed_slot_joins_the_waitlist() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();
        let app = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        engine.confirm_application(&mut conn, app.id, CREATOR).unwrap();

        let late = engine.apply(&mut conn, fx.slot_id, 9, None).unwrap();
        assert_eq!(late.status, ApplicationStatus::Waitlisted);
    }

    #[test]
    fn reject_releases_the_hold_for_the_next_applicant() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();
        let app = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();

        engine
            .reject_application(&mut conn, app.id, CREATOR)
            .unwrap();
        let slot = database::slots::get_slot(&conn, fx.slot_id).unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Available);

        let next = engine.apply(&mut conn, fx.slot_id, 3, None).unwrap();
        assert_eq!(next.status, ApplicationStatus::Pending);
    }

    #[test]
    fn waitlisted_reapply_takes_a_reopened_slot() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();

        let holder = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        let waiting = engine.apply(&mut conn, fx.slot_id, 3, None).unwrap();
        assert_eq!(waiting.status, ApplicationStatus::Waitlisted);

        // Rejecting the holder releases the lock; the waitlisted applicant's
        // next apply takes it.
        engine
            .reject_application(&mut conn, holder.id, CREATOR)
            .unwrap();

        let promoted = engine.apply(&mut conn, fx.slot_id, 3, None).unwrap();
        assert_eq!(promoted.id, waiting.id);
        assert_eq!(promoted.status, ApplicationStatus::Pending);

        let slot = database::slots::get_slot(&conn, fx.slot_id).unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Locked);
        assert_eq!(slot.locked_by_user_id, Some(3));
    }

    #[test]
    fn losing_the_version_race_degrades_to_waitlist() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();
        let now = Utc::now().naive_utc();

        // Read the open slot, then let another applicant take the hold
        // before the snapshot holder reaches its compare-and-swap.
        let stale = database::slots::get_slot(&conn, fx.slot_id).unwrap().unwrap();
        engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();

        let status = engine.lock_or_waitlist(&conn, &stale, 3, now).unwrap();
        assert_eq!(status, ApplicationStatus::Waitlisted);

        // The winner's hold is untouched.
        let slot = database::slots::get_slot(&conn, fx.slot_id).unwrap().unwrap();
        assert_eq!(slot.locked_by_user_id, Some(2));
    }

    #[test]
    fn sibling_rejection_is_not_a_cancellation() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();

        let chosen = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        let sibling = engine.apply(&mut conn, fx.slot_id, 3, None).unwrap();
        engine
            .confirm_application(&mut conn, chosen.id, CREATOR)
            .unwrap();

        // The sibling was rejected by the confirmation, never confirmed;
        // cancelling it must not masquerade as a repeat cancellation.
        let err = engine
            .cancel_confirmed_application(&mut conn, sibling.id, 3)
            .unwrap_err();
        assert!(matches!(err, DomainError::SlotUnavailable));

        let slot = database::slots::get_slot(&conn, fx.slot_id).unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Confirmed);
    }

    #[test]
    fn cancel_promotes_the_oldest_waitlisted_exactly_once() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();

        let winner = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        let oldest_waitlisted = engine.apply(&mut conn, fx.slot_id, 3, None).unwrap();
        engine.apply(&mut conn, fx.slot_id, 4, None).unwrap();
        engine
            .confirm_application(&mut conn, winner.id, CREATOR)
            .unwrap();

        // Siblings were rejected on confirmation; apply two fresh waitlist
        // entries against the confirmed slot.
        let w1 = engine.apply(&mut conn, fx.slot_id, 5, None).unwrap();
        let w2 = engine.apply(&mut conn, fx.slot_id, 6, None).unwrap();
        assert_eq!(w1.status, ApplicationStatus::Waitlisted);
        assert_eq!(w2.status, ApplicationStatus::Waitlisted);
        assert_eq!(oldest_waitlisted.status, ApplicationStatus::Waitlisted);

        engine
            .cancel_confirmed_application(&mut conn, winner.id, 2)
            .unwrap();

        let all = database::applications::list_by_slot(&conn, fx.slot_id).unwrap();
        let pending: Vec<_> = all
            .iter()
            .filter(|a| a.status == ApplicationStatus::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].applicant_id, 5); // w1 is the oldest live entry

        // Repeat cancellation changes nothing.
        engine
            .cancel_confirmed_application(&mut conn, winner.id, 2)
            .unwrap();
        let still_pending = database::applications::list_by_slot(&conn, fx.slot_id)
            .unwrap()
            .into_iter()
            .filter(|a| a.status == ApplicationStatus::Pending)
            .count();
        assert_eq!(still_pending, 1);

        let canceller = database::ratings::get_user_stats(&conn, 2).unwrap().unwrap();
        assert_eq!(canceller.cancel_count, 1);
    }

    #[test]
    fn cancel_without_waitlist_reopens_the_slot() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();
        let app = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        engine.confirm_application(&mut conn, app.id, CREATOR).unwrap();

        engine
            .cancel_confirmed_application(&mut conn, app.id, CREATOR)
            .unwrap();
        let slot = database::slots::get_slot(&conn, fx.slot_id).unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Available);
        let match_row = database::matches::get_match(&conn, fx.match_id)
            .unwrap()
            .unwrap();
        assert_eq!(match_row.status, MatchStatus::Pending);
    }

    #[test]
    fn stale_pending_applications_expire_lazily() {
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();
        let app = engine.apply(&mut conn, fx.slot_id, 2, None).unwrap();
        assert_eq!(app.status, ApplicationStatus::Pending);

        // Backdate the hold past its TTL.
        let past = Utc::now().naive_utc() - Duration::minutes(1);
        conn.execute(
            "UPDATE match_slots SET expires_at = ?2 WHERE id = ?1",
            rusqlite::params![fx.slot_id, past],
        )
        .unwrap();

        // The next apply sees the expiry, expires the stale application and
        // takes the slot.
        let next = engine.apply(&mut conn, fx.slot_id, 3, None).unwrap();
        assert_eq!(next.status, ApplicationStatus::Pending);

        let old = database::applications::get_application(&conn, app.id)
            .unwrap()
            .unwrap();
        assert_eq!(old.status, ApplicationStatus::Expired);
    }

    #[test]
    fn confirmed_slot_never_holds_two_confirmed_applications() {
        // Random-ish interleavings of apply/confirm/cancel, checking the
        // exclusivity invariant after every mutation.
        let fx = fixture();
        let mut conn = fx.pool.get().unwrap();
        let engine = engine();

        let mut app_ids = Vec::new();
        for user in 2..=7 {
            let app = engine.apply(&mut conn, fx.slot_id, user, None).unwrap();
            app_ids.push(app.id);
            assert!(database::applications::count_confirmed(&conn, fx.slot_id).unwrap() <= 1);
        }

        for (step, app_id) in app_ids.iter().enumerate() {
            let _ = engine.confirm_application(&mut conn, *app_id, CREATOR);
            assert!(database::applications::count_confirmed(&conn, fx.slot_id).unwrap() <= 1);
            if step % 2 == 0 {
                let _ = engine.cancel_confirmed_application(&mut conn, *app_id, CREATOR);
                assert!(
                    database::applications::count_confirmed(&conn, fx.slot_id).unwrap() <= 1
                );
            }
        }
    }
}
