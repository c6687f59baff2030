use chrono::Utc;
use log::info;
use serde_json::json;

use super::slot_store::SlotStore;
use crate::config::settings::AppConfig;
use crate::database::models::ResultRow;
use crate::database::{applications, events, matches, ratings, slots, DbConn};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::{DomainEvent, EventType};
use crate::domain::models::{ApplicationStatus, MatchFormat, MatchStatus, SlotStatus};
use crate::domain::score::{Outcome, ReportedScore};
use crate::rating;

/// Validates a reported score, rates the match and finalizes it. The two
/// history rows, both snapshot updates and the slot/match completion land
/// in one transaction; a partially applied rating update is not a valid
/// outcome.
pub struct ResultPipeline {
    config: AppConfig,
    slot_store: SlotStore,
}

impl ResultPipeline {
    pub fn new(config: AppConfig) -> Self {
        let slot_store = SlotStore::new(config.slots.clone());
        Self { config, slot_store }
    }

    pub fn submit_result(
        &self,
        conn: &mut DbConn,
        match_id: i64,
        submitter_id: i64,
        score: &ReportedScore,
    ) -> DomainResult<ResultRow> {
        let now = Utc::now().naive_utc();
        let tx = conn.transaction().map_err(DomainError::Storage)?;

        let match_row =
            matches::get_match(&tx, match_id)?.ok_or(DomainError::NotFound("match"))?;
        match match_row.status {
            MatchStatus::Confirmed => {}
            MatchStatus::Completed => return Err(DomainError::AlreadyConfirmed),
            MatchStatus::Pending | MatchStatus::Cancelled => {
                return Err(DomainError::Validation(
                    "match has no confirmed pairing to report on".into(),
                ))
            }
        }
        if results_exist(&tx, match_id)? {
            return Err(DomainError::AlreadyConfirmed);
        }

        // Exactly one confirmed slot carries the pairing.
        let confirmed_slots: Vec<_> = slots::list_by_match(&tx, match_id)?
            .into_iter()
            .filter(|s| s.status == SlotStatus::Confirmed)
            .collect();
        let [slot] = confirmed_slots.as_slice() else {
            return Err(DomainError::Validation(format!(
                "expected exactly one confirmed slot, found {}",
                confirmed_slots.len()
            )));
        };

        let confirmed_apps =
            applications::find_by_slot_and_status(&tx, slot.id, ApplicationStatus::Confirmed)?;
        let [application] = confirmed_apps.as_slice() else {
            return Err(DomainError::Validation(
                "confirmed slot has no confirmed application".into(),
            ));
        };

        let creator_id = match_row.creator_id;
        let opponent_id = application.applicant_id;
        if submitter_id != creator_id && submitter_id != opponent_id {
            return Err(DomainError::Forbidden);
        }
        let other_id = if submitter_id == creator_id {
            opponent_id
        } else {
            creator_id
        };

        let (winner_id, loser_id) = match score.decide()? {
            Outcome::SubmitterWon => (submitter_id, other_id),
            Outcome::SubmitterLost => (other_id, submitter_id),
        };

        self.apply_rating(&tx, match_id, match_row.format, winner_id, loser_id, now)?;

        let result = crate::database::results::insert_result(
            &tx,
            match_id,
            submitter_id,
            winner_id,
            loser_id,
            &score.render(),
        )?;

        self.slot_store.complete(&tx, slot.id, now)?;
        matches::set_status(&tx, match_id, MatchStatus::Completed)?;

        events::append_event(
            &tx,
            &DomainEvent::new(
                EventType::ResultAccepted,
                match_id,
                vec![winner_id, loser_id],
                json!({
                    "winner_id": winner_id,
                    "score": result.score_text,
                }),
            ),
        )?;

        tx.commit().map_err(DomainError::Storage)?;
        info!(
            "result accepted for match {match_id}: winner {winner_id}, score {}",
            result.score_text
        );
        Ok(result)
    }

    fn apply_rating(
        &self,
        tx: &rusqlite::Connection,
        match_id: i64,
        format: MatchFormat,
        winner_id: i64,
        loser_id: i64,
        now: chrono::NaiveDateTime,
    ) -> DomainResult<()> {
        let start = self.config.rating.start_rating;
        let mut winner = ratings::ensure_user_stats(tx, winner_id, start, now)?;
        let mut loser = ratings::ensure_user_stats(tx, loser_id, start, now)?;

        let update = rating::rate_match(
            winner.elo_for(format),
            loser.elo_for(format),
            format,
            &self.config.rating,
        );

        ratings::insert_elo_log(
            tx,
            winner_id,
            match_id,
            format,
            update.winner_before,
            update.winner_after,
            now,
        )?;
        ratings::insert_elo_log(
            tx,
            loser_id,
            match_id,
            format,
            update.loser_before,
            update.loser_after,
            now,
        )?;

        let winner_streak = winner.streak_for(format) + 1;
        set_elo(&mut winner, format, update.winner_after);
        set_streak(&mut winner, format, winner_streak);
        winner.total_matches += 1;
        winner.total_wins += 1;
        winner.updated_at = now;

        set_elo(&mut loser, format, update.loser_after);
        set_streak(&mut loser, format, 0);
        loser.total_matches += 1;
        loser.total_losses += 1;
        loser.updated_at = now;

        ratings::save_user_stats(tx, &winner)?;
        ratings::save_user_stats(tx, &loser)?;
        Ok(())
    }

    /// The non-submitting participant flags the accepted result. The result
    /// row and the ratings stand; dispute resolution is an administrative
    /// concern outside the core.
    pub fn dispute_result(
        &self,
        conn: &mut DbConn,
        match_id: i64,
        acting_user_id: i64,
    ) -> DomainResult<ResultRow> {
        let tx = conn.transaction().map_err(DomainError::Storage)?;
        let result = crate::database::results::get_by_match(&tx, match_id)?
            .ok_or(DomainError::NotFound("result"))?;

        let is_participant =
            acting_user_id == result.winner_id || acting_user_id == result.loser_id;
        if !is_participant || acting_user_id == result.submitter_id {
            return Err(DomainError::Forbidden);
        }
        if !result.disputed {
            crate::database::results::mark_disputed(&tx, result.id)?;
            events::append_event(
                &tx,
                &DomainEvent::new(
                    EventType::ResultDisputed,
                    match_id,
                    vec![result.winner_id, result.loser_id],
                    json!({ "result_id": result.id }),
                ),
            )?;
        }

        let updated = crate::database::results::get_by_match(&tx, match_id)?
            .ok_or(DomainError::NotFound("result"))?;
        tx.commit().map_err(DomainError::Storage)?;
        Ok(updated)
    }
}

fn results_exist(conn: &rusqlite::Connection, match_id: i64) -> DomainResult<bool> {
    Ok(crate::database::results::get_by_match(conn, match_id)?.is_some())
}

fn set_elo(stats: &mut crate::database::models::UserStatsRow, format: MatchFormat, elo: f64) {
    match format {
        MatchFormat::Singles => stats.singles_elo = elo,
        MatchFormat::Doubles => stats.doubles_elo = elo,
    }
}

fn set_streak(stats: &mut crate::database::models::UserStatsRow, format: MatchFormat, streak: i32) {
    match format {
        MatchFormat::Singles => stats.singles_streak = streak,
        MatchFormat::Doubles => stats.doubles_streak = streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use crate::services::applications::ApplicationEngine;
    use crate::services::lifecycle::{MatchLifecycle, NewMatchRequest};
    use chrono::Duration;

    const CREATOR: i64 = 1;
    const OPPONENT: i64 = 2;

    struct Fixture {
        pool: database::DbPool,
        match_id: i64,
    }

    /// Match with one slot, opponent applied and confirmed.
    fn confirmed_fixture(format: MatchFormat) -> Fixture {
        let pool = database::create_memory_pool().unwrap();
        {
            let conn = pool.get().unwrap();
            database::setup::init_schema(&conn).unwrap();
        }
        let mut conn = pool.get().unwrap();
        let now = Utc::now().naive_utc();
        let config = AppConfig::new();
        let detail = MatchLifecycle::new(config.clone())
            .create_match(
                &mut conn,
                &NewMatchRequest {
                    creator_id: CREATOR,
                    court_id: 10,
                    date: now,
                    format,
                    skill_min: None,
                    skill_max: None,
                    gender_filter: None,
                    surface_filter: None,
                    max_distance_km: None,
                    slots: vec![(now, now + Duration::hours(1))],
                },
            )
            .unwrap();
        let engine = ApplicationEngine::new(&config);
        let slot_id = detail.slots[0].0.id;
        let app = engine.apply(&mut conn, slot_id, OPPONENT, None).unwrap();
        engine.confirm_application(&mut conn, app.id, CREATOR).unwrap();
        drop(conn);
        Fixture {
            pool,
            match_id: detail.match_row.id,
        }
    }

    fn pipeline() -> ResultPipeline {
        ResultPipeline::new(AppConfig::new())
    }

    fn score(text: &str) -> ReportedScore {
        ReportedScore::parse(text, false, false).unwrap()
    }

    #[test]
    fn accepted_result_updates_both_participants() {
        let fx = confirmed_fixture(MatchFormat::Singles);
        let mut conn = fx.pool.get().unwrap();

        let result = pipeline()
            .submit_result(&mut conn, fx.match_id, CREATOR, &score("6-4 6-3"))
            .unwrap();
        assert_eq!(result.winner_id, CREATOR);
        assert_eq!(result.loser_id, OPPONENT);

        let log = database::ratings::list_elo_log_for_match(&conn, fx.match_id).unwrap();
        assert_eq!(log.len(), 2);

        let winner = database::ratings::get_user_stats(&conn, CREATOR)
            .unwrap()
            .unwrap();
        let loser = database::ratings::get_user_stats(&conn, OPPONENT)
            .unwrap()
            .unwrap();
        assert_eq!(winner.total_wins, 1);
        assert_eq!(winner.singles_streak, 1);
        assert_eq!(loser.total_losses, 1);
        assert_eq!(loser.singles_streak, 0);

        // Symmetric delta from equal starting ratings.
        let start = AppConfig::new().rating.start_rating;
        assert!(((winner.singles_elo - start) - (start - loser.singles_elo)).abs() < 1e-9);

        let match_row = database::matches::get_match(&conn, fx.match_id)
            .unwrap()
            .unwrap();
        assert_eq!(match_row.status, MatchStatus::Completed);
    }

    #[test]
    fn loss_reported_by_loser_credits_the_opponent() {
        let fx = confirmed_fixture(MatchFormat::Singles);
        let mut conn = fx.pool.get().unwrap();

        let result = pipeline()
            .submit_result(&mut conn, fx.match_id, OPPONENT, &score("4-6 3-6"))
            .unwrap();
        assert_eq!(result.winner_id, CREATOR);
    }

    #[test]
    fn doubles_results_touch_doubles_elo_only() {
        let fx = confirmed_fixture(MatchFormat::Doubles);
        let mut conn = fx.pool.get().unwrap();

        pipeline()
            .submit_result(&mut conn, fx.match_id, CREATOR, &score("6-4 6-3"))
            .unwrap();

        let start = AppConfig::new().rating.start_rating;
        let winner = database::ratings::get_user_stats(&conn, CREATOR)
            .unwrap()
            .unwrap();
        assert_eq!(winner.singles_elo, start);
        assert!(winner.doubles_elo > start);
        assert_eq!(winner.doubles_streak, 1);
    }

    #[test]
    fn invalid_score_is_rejected_before_any_write() {
        let fx = confirmed_fixture(MatchFormat::Singles);
        let mut conn = fx.pool.get().unwrap();

        let undecidable = score("6-5 6-3");
        let err = pipeline()
            .submit_result(&mut conn, fx.match_id, CREATOR, &undecidable)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidScore(_)));

        assert!(database::ratings::list_elo_log_for_match(&conn, fx.match_id)
            .unwrap()
            .is_empty());
        let match_row = database::matches::get_match(&conn, fx.match_id)
            .unwrap()
            .unwrap();
        assert_eq!(match_row.status, MatchStatus::Confirmed);
    }

    #[test]
    fn non_participant_may_not_submit() {
        let fx = confirmed_fixture(MatchFormat::Singles);
        let mut conn = fx.pool.get().unwrap();
        let err = pipeline()
            .submit_result(&mut conn, fx.match_id, 99, &score("6-4 6-3"))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
    }

    #[test]
    fn second_submission_is_rejected() {
        let fx = confirmed_fixture(MatchFormat::Singles);
        let mut conn = fx.pool.get().unwrap();
        pipeline()
            .submit_result(&mut conn, fx.match_id, CREATOR, &score("6-4 6-3"))
            .unwrap();
        let err = pipeline()
            .submit_result(&mut conn, fx.match_id, OPPONENT, &score("6-4 6-3"))
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyConfirmed));
    }

    #[test]
    fn retirement_flag_decides_the_winner() {
        let fx = confirmed_fixture(MatchFormat::Singles);
        let mut conn = fx.pool.get().unwrap();
        let retired = ReportedScore::parse("6-4 2-1", false, true).unwrap();
        let result = pipeline()
            .submit_result(&mut conn, fx.match_id, OPPONENT, &retired)
            .unwrap();
        assert_eq!(result.winner_id, OPPONENT);
        assert_eq!(result.score_text, "6-4 2-1 ret.");
    }

    #[test]
    fn only_the_other_participant_may_dispute() {
        let fx = confirmed_fixture(MatchFormat::Singles);
        let mut conn = fx.pool.get().unwrap();
        pipeline()
            .submit_result(&mut conn, fx.match_id, CREATOR, &score("6-4 6-3"))
            .unwrap();

        let err = pipeline()
            .dispute_result(&mut conn, fx.match_id, CREATOR)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));

        let disputed = pipeline()
            .dispute_result(&mut conn, fx.match_id, OPPONENT)
            .unwrap();
        assert!(disputed.disputed);

        // Disputing twice is a no-op.
        let again = pipeline()
            .dispute_result(&mut conn, fx.match_id, OPPONENT)
            .unwrap();
        assert!(again.disputed);
    }

    #[test]
    fn pending_match_has_nothing_to_report() {
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
        let err = pipeline()
            .submit_result(&mut conn, detail.match_row.id, CREATOR, &score("6-4 6-3"))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
