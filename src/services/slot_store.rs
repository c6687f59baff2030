use chrono::{Duration, NaiveDateTime};
use log::debug;
use rusqlite::Connection;

use crate::config::settings::SlotSettings;
use crate::database::models::SlotRow;
use crate::database::slots;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::SlotStatus;

/// Arbiter of slot state and the short-lived reservation hold. Every
/// mutation re-reads the row, applies lazy lock expiry and goes through the
/// version compare-and-swap, so a stale in-process view can never clobber a
/// newer write. Callers supply the connection (usually a transaction) and
/// the current time.
pub struct SlotStore {
    settings: SlotSettings,
}

impl SlotStore {
    pub fn new(settings: SlotSettings) -> Self {
        Self { settings }
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::minutes(self.settings.lock_ttl_minutes)
    }

    fn load(&self, conn: &Connection, slot_id: i64) -> DomainResult<SlotRow> {
        slots::get_slot(conn, slot_id)?.ok_or(DomainError::NotFound("slot"))
    }

    /// Acquire (or refresh) the reservation hold. Succeeds only when the
    /// slot is available, its previous hold has lapsed, or the caller
    /// already holds it.
    pub fn try_lock(
        &self,
        conn: &Connection,
        slot_id: i64,
        user_id: i64,
        now: NaiveDateTime,
    ) -> DomainResult<SlotRow> {
        let slot = self.load(conn, slot_id)?;
        self.try_lock_from(conn, &slot, user_id, now)
    }

    /// Like `try_lock`, but guards and swaps against a row the caller has
    /// already read. A writer that moved the version in between surfaces
    /// as `SlotUnavailable`.
    pub fn try_lock_from(
        &self,
        conn: &Connection,
        slot: &SlotRow,
        user_id: i64,
        now: NaiveDateTime,
    ) -> DomainResult<SlotRow> {
        match slot.effective_status(now) {
            SlotStatus::Available => {}
            SlotStatus::Locked if slot.locked_by_user_id == Some(user_id) => {
                // Re-submission by the holder refreshes the hold.
            }
            _ => return Err(DomainError::SlotUnavailable),
        }

        let expires_at = now + self.lock_ttl();
        if !slots::cas_set_lock(conn, slot.id, slot.version, user_id, now, expires_at)? {
            // Version moved underneath us: someone else got there first.
            return Err(DomainError::SlotUnavailable);
        }
        debug!("slot {} locked by user {user_id} until {expires_at}", slot.id);
        self.load(conn, slot.id)
    }

    /// Release the hold if (and only if) `user_id` holds it. A no-op in
    /// every other case, including after expiry, so abandoning an apply is
    /// always safe.
    pub fn release_lock(
        &self,
        conn: &Connection,
        slot_id: i64,
        user_id: i64,
    ) -> DomainResult<()> {
        let slot = self.load(conn, slot_id)?;
        if slot.status != SlotStatus::Locked || slot.locked_by_user_id != Some(user_id) {
            return Ok(());
        }
        // A lost CAS here means the state already moved on; nothing to undo.
        slots::cas_set_status(conn, slot_id, slot.version, SlotStatus::Available)?;
        Ok(())
    }

    /// Lock → confirmed. The hold does not need to name a particular user;
    /// exclusivity against other applications is the Application Engine's
    /// job.
    pub fn confirm(
        &self,
        conn: &Connection,
        slot_id: i64,
        now: NaiveDateTime,
    ) -> DomainResult<SlotRow> {
        self.transition(conn, slot_id, SlotStatus::Confirmed, now)
    }

    /// Confirmed → completed, after a result is accepted.
    pub fn complete(
        &self,
        conn: &Connection,
        slot_id: i64,
        now: NaiveDateTime,
    ) -> DomainResult<SlotRow> {
        self.transition(conn, slot_id, SlotStatus::Completed, now)
    }

    /// Any non-terminal state → cancelled.
    pub fn cancel(
        &self,
        conn: &Connection,
        slot_id: i64,
        now: NaiveDateTime,
    ) -> DomainResult<SlotRow> {
        self.transition(conn, slot_id, SlotStatus::Cancelled, now)
    }

    /// Confirmed → available, when a confirmed application is cancelled and
    /// the slot reopens.
    pub fn reopen(
        &self,
        conn: &Connection,
        slot_id: i64,
        now: NaiveDateTime,
    ) -> DomainResult<SlotRow> {
        self.transition(conn, slot_id, SlotStatus::Available, now)
    }

    fn transition(
        &self,
        conn: &Connection,
        slot_id: i64,
        to: SlotStatus,
        now: NaiveDateTime,
    ) -> DomainResult<SlotRow> {
        let slot = self.load(conn, slot_id)?;
        let from = slot.effective_status(now);
        if !from.can_transition_to(to) {
            return Err(DomainError::InvalidSlotTransition { from, to });
        }
        if !slots::cas_set_status(conn, slot_id, slot.version, to)? {
            return Err(DomainError::SlotUnavailable);
        }
        debug!("slot {slot_id}: {from} -> {to}");
        self.load(conn, slot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use chrono::Utc;

    fn setup() -> (database::DbPool, i64) {
        let pool = database::create_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        database::setup::init_schema(&conn).unwrap();
        let m = database::matches::insert_match(
            &conn,
            &database::matches::NewMatch {
                creator_id: 1,
                court_id: 10,
                date: Utc::now().naive_utc(),
                format: crate::domain::MatchFormat::Singles,
                skill_min: None,
                skill_max: None,
                gender_filter: None,
                surface_filter: None,
                max_distance_km: None,
            },
        )
        .unwrap();
        let now = Utc::now().naive_utc();
        let slot =
            database::slots::insert_slot(&conn, m.id, now, now + Duration::hours(1)).unwrap();
        (pool, slot.id)
    }

    fn store() -> SlotStore {
        SlotStore::new(SlotSettings::default())
    }

    #[test]
    fn lock_then_steal_fails_until_expiry() {
        let (pool, slot_id) = setup();
        let conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();

        let slot = store().try_lock(&conn, slot_id, 2, now).unwrap();
        assert_eq!(slot.status, SlotStatus::Locked);
        assert_eq!(slot.locked_by_user_id, Some(2));

        assert!(matches!(
            store().try_lock(&conn, slot_id, 3, now),
            Err(DomainError::SlotUnavailable)
        ));

        // After the TTL the hold is treated as free, no sweep needed.
        let later = now + store().lock_ttl() + Duration::seconds(1);
        let slot = store().try_lock(&conn, slot_id, 3, later).unwrap();
        assert_eq!(slot.locked_by_user_id, Some(3));
    }

    #[test]
    fn stale_snapshot_loses_the_version_race() {
        let (pool, slot_id) = setup();
        let conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();

        // Read the open slot, then let another user take the hold before
        // the snapshot holder reaches its compare-and-swap.
        let snapshot = database::slots::get_slot(&conn, slot_id).unwrap().unwrap();
        store().try_lock(&conn, slot_id, 2, now).unwrap();

        assert!(matches!(
            store().try_lock_from(&conn, &snapshot, 3, now),
            Err(DomainError::SlotUnavailable)
        ));
        let slot = database::slots::get_slot(&conn, slot_id).unwrap().unwrap();
        assert_eq!(slot.locked_by_user_id, Some(2));
    }

    #[test]
    fn holder_resubmission_refreshes_the_hold() {
        let (pool, slot_id) = setup();
        let conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();

        let first = store().try_lock(&conn, slot_id, 2, now).unwrap();
        let again = store()
            .try_lock(&conn, slot_id, 2, now + Duration::minutes(5))
            .unwrap();
        assert!(again.expires_at.unwrap() > first.expires_at.unwrap());
    }

    #[test]
    fn release_is_idempotent_and_holder_only() {
        let (pool, slot_id) = setup();
        let conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();

        store().try_lock(&conn, slot_id, 2, now).unwrap();

        // Non-holder release changes nothing.
        store().release_lock(&conn, slot_id, 3).unwrap();
        let slot = database::slots::get_slot(&conn, slot_id).unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Locked);

        store().release_lock(&conn, slot_id, 2).unwrap();
        let slot = database::slots::get_slot(&conn, slot_id).unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Available);

        // Releasing twice is a no-op.
        store().release_lock(&conn, slot_id, 2).unwrap();
    }

    #[test]
    fn confirm_requires_a_lock() {
        let (pool, slot_id) = setup();
        let conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();

        assert!(matches!(
            store().confirm(&conn, slot_id, now),
            Err(DomainError::InvalidSlotTransition { .. })
        ));

        store().try_lock(&conn, slot_id, 2, now).unwrap();
        let slot = store().confirm(&conn, slot_id, now).unwrap();
        assert_eq!(slot.status, SlotStatus::Confirmed);
        assert_eq!(slot.locked_by_user_id, None);
    }

    #[test]
    fn complete_requires_confirmed() {
        let (pool, slot_id) = setup();
        let conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();

        assert!(matches!(
            store().complete(&conn, slot_id, now),
            Err(DomainError::InvalidSlotTransition { .. })
        ));

        store().try_lock(&conn, slot_id, 2, now).unwrap();
        store().confirm(&conn, slot_id, now).unwrap();
        let slot = store().complete(&conn, slot_id, now).unwrap();
        assert_eq!(slot.status, SlotStatus::Completed);

        // Terminal: no way back.
        assert!(matches!(
            store().cancel(&conn, slot_id, now),
            Err(DomainError::InvalidSlotTransition { .. })
        ));
    }

    #[test]
    fn cancel_reaches_every_live_state() {
        let now = Utc::now().naive_utc();
        for lock_first in [false, true] {
            let (pool, slot_id) = setup();
            let conn = pool.get().unwrap();
            if lock_first {
                store().try_lock(&conn, slot_id, 2, now).unwrap();
            }
            let slot = store().cancel(&conn, slot_id, now).unwrap();
            assert_eq!(slot.status, SlotStatus::Cancelled);
        }
    }
}
