use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::domain::events::EventType;
use crate::domain::models::{ApplicationStatus, MatchFormat, MatchStatus, SlotStatus};

#[derive(Debug, Clone)]
pub struct MatchRow {
    pub id: i64,
    pub creator_id: i64,
    pub court_id: i64,
    pub date: NaiveDateTime,
    pub format: MatchFormat,
    pub skill_min: Option<f64>,
    pub skill_max: Option<f64>,
    pub gender_filter: Option<String>,
    pub surface_filter: Option<String>,
    pub max_distance_km: Option<f64>,
    pub status: MatchStatus,
    pub cancel_reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct SlotRow {
    pub id: i64,
    pub match_id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: SlotStatus,
    pub locked_by_user_id: Option<i64>,
    pub locked_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
    pub version: i64,
    pub created_at: NaiveDateTime,
}

impl SlotRow {
    /// The status with lazy lock expiry applied: an expired hold reads as
    /// available again. All guards go through this, never raw `status`.
    pub fn effective_status(&self, now: NaiveDateTime) -> SlotStatus {
        if self.status == SlotStatus::Locked && self.lock_expired(now) {
            SlotStatus::Available
        } else {
            self.status
        }
    }

    pub fn lock_expired(&self, now: NaiveDateTime) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => true,
        }
    }

    /// Whether `user_id` holds a live lock on this slot.
    pub fn held_by(&self, user_id: i64, now: NaiveDateTime) -> bool {
        self.status == SlotStatus::Locked
            && self.locked_by_user_id == Some(user_id)
            && !self.lock_expired(now)
    }
}

#[derive(Debug, Clone)]
pub struct ApplicationRow {
    pub id: i64,
    pub slot_id: i64,
    pub applicant_id: i64,
    pub guest_partner_name: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct ResultRow {
    pub id: i64,
    pub match_id: i64,
    pub submitter_id: i64,
    pub winner_id: i64,
    pub loser_id: i64,
    pub score_text: String,
    pub disputed: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct EloLogRow {
    pub id: i64,
    pub user_id: i64,
    pub match_id: i64,
    pub match_type: MatchFormat,
    pub elo_before: f64,
    pub elo_after: f64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct UserStatsRow {
    pub user_id: i64,
    pub singles_elo: f64,
    pub doubles_elo: f64,
    pub singles_streak: i32,
    pub doubles_streak: i32,
    pub total_matches: i32,
    pub total_wins: i32,
    pub total_losses: i32,
    pub cancel_count: i32,
    pub updated_at: NaiveDateTime,
}

impl UserStatsRow {
    pub fn elo_for(&self, format: MatchFormat) -> f64 {
        match format {
            MatchFormat::Singles => self.singles_elo,
            MatchFormat::Doubles => self.doubles_elo,
        }
    }

    pub fn streak_for(&self, format: MatchFormat) -> i32 {
        match format {
            MatchFormat::Singles => self.singles_streak,
            MatchFormat::Doubles => self.doubles_streak,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: i64,
    pub event_type: EventType,
    pub match_id: i64,
    pub affected_user_ids: Vec<i64>,
    pub payload: serde_json::Value,
    pub created_at: NaiveDateTime,
}

// Status enums are stored as their lowercase strings; the conversions live
// here so the query modules can row.get() them directly.

macro_rules! impl_sql_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                <$ty>::parse(text).map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

impl_sql_enum!(MatchStatus);
impl_sql_enum!(SlotStatus);
impl_sql_enum!(ApplicationStatus);
impl_sql_enum!(MatchFormat);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn slot(status: SlotStatus, expires_in_minutes: i64) -> SlotRow {
        let now = Utc::now().naive_utc();
        SlotRow {
            id: 1,
            match_id: 1,
            start_time: now,
            end_time: now + Duration::hours(1),
            status,
            locked_by_user_id: Some(7),
            locked_at: Some(now),
            expires_at: Some(now + Duration::minutes(expires_in_minutes)),
            version: 0,
            created_at: now,
        }
    }

    #[test]
    fn expired_lock_reads_as_available() {
        let now = Utc::now().naive_utc();
        assert_eq!(
            slot(SlotStatus::Locked, -1).effective_status(now),
            SlotStatus::Available
        );
        assert_eq!(
            slot(SlotStatus::Locked, 10).effective_status(now),
            SlotStatus::Locked
        );
    }

    #[test]
    fn expiry_does_not_rewrite_other_states() {
        let now = Utc::now().naive_utc();
        assert_eq!(
            slot(SlotStatus::Confirmed, -1).effective_status(now),
            SlotStatus::Confirmed
        );
    }

    #[test]
    fn held_by_respects_holder_and_expiry() {
        let now = Utc::now().naive_utc();
        assert!(slot(SlotStatus::Locked, 10).held_by(7, now));
        assert!(!slot(SlotStatus::Locked, 10).held_by(8, now));
        assert!(!slot(SlotStatus::Locked, -1).held_by(7, now));
    }
}
