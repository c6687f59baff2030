use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::database::models::{
    ApplicationRow, EloLogRow, EventRow, MatchRow, ResultRow, SlotRow, UserStatsRow,
};
use crate::domain::models::{ApplicationStatus, MatchFormat, MatchStatus, SlotStatus};

#[derive(Deserialize)]
pub struct SlotWindow {
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

#[derive(Deserialize)]
pub struct CreateMatchRequest {
    pub court_id: i64,
    pub date: NaiveDateTime,
    pub format: MatchFormat,
    pub skill_min: Option<f64>,
    pub skill_max: Option<f64>,
    pub gender_filter: Option<String>,
    pub surface_filter: Option<String>,
    pub max_distance_km: Option<f64>,
    pub slots: Vec<SlotWindow>,
}

#[derive(Deserialize)]
pub struct EditMatchRequest {
    pub court_id: i64,
    pub date: NaiveDateTime,
    pub skill_min: Option<f64>,
    pub skill_max: Option<f64>,
    pub gender_filter: Option<String>,
    pub surface_filter: Option<String>,
    pub max_distance_km: Option<f64>,
}

#[derive(Deserialize)]
pub struct MatchListParams {
    pub status: Option<MatchStatus>,
}

#[derive(Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub guest_partner_name: Option<String>,
}

#[derive(Deserialize)]
pub struct ForceCancelRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct SubmitResultRequest {
    #[serde(default)]
    pub score: String,
    #[serde(default)]
    pub won_by_default: bool,
    #[serde(default)]
    pub opponent_retired: bool,
}

#[derive(Deserialize)]
pub struct EventsParams {
    pub after: Option<i64>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct MatchView {
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
}

impl From<MatchRow> for MatchView {
    fn from(row: MatchRow) -> Self {
        Self {
            id: row.id,
            creator_id: row.creator_id,
            court_id: row.court_id,
            date: row.date,
            format: row.format,
            skill_min: row.skill_min,
            skill_max: row.skill_max,
            gender_filter: row.gender_filter,
            surface_filter: row.surface_filter,
            max_distance_km: row.max_distance_km,
            status: row.status,
            cancel_reason: row.cancel_reason,
        }
    }
}

#[derive(Serialize)]
pub struct SlotView {
    pub id: i64,
    pub match_id: i64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: SlotStatus,
    pub locked_by_user_id: Option<i64>,
    pub expires_at: Option<NaiveDateTime>,
    pub applications: Vec<ApplicationView>,
}

impl SlotView {
    pub fn from_row(row: SlotRow, applications: Vec<ApplicationRow>) -> Self {
        Self {
            id: row.id,
            match_id: row.match_id,
            start_time: row.start_time,
            end_time: row.end_time,
            status: row.status,
            locked_by_user_id: row.locked_by_user_id,
            expires_at: row.expires_at,
            applications: applications.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ApplicationView {
    pub id: i64,
    pub slot_id: i64,
    pub applicant_id: i64,
    pub guest_partner_name: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: NaiveDateTime,
}

impl From<ApplicationRow> for ApplicationView {
    fn from(row: ApplicationRow) -> Self {
        Self {
            id: row.id,
            slot_id: row.slot_id,
            applicant_id: row.applicant_id,
            guest_partner_name: row.guest_partner_name,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct MatchDetailView {
    #[serde(flatten)]
    pub match_view: MatchView,
    pub slots: Vec<SlotView>,
}

#[derive(Serialize)]
pub struct ResultView {
    pub id: i64,
    pub match_id: i64,
    pub submitter_id: i64,
    pub winner_id: i64,
    pub loser_id: i64,
    pub score: String,
    pub disputed: bool,
}

impl From<ResultRow> for ResultView {
    fn from(row: ResultRow) -> Self {
        Self {
            id: row.id,
            match_id: row.match_id,
            submitter_id: row.submitter_id,
            winner_id: row.winner_id,
            loser_id: row.loser_id,
            score: row.score_text,
            disputed: row.disputed,
        }
    }
}

#[derive(Serialize)]
pub struct EloLogItem {
    pub match_id: i64,
    pub match_type: MatchFormat,
    pub elo_before: f64,
    pub elo_after: f64,
    pub delta: f64,
    pub created_at: NaiveDateTime,
}

impl From<EloLogRow> for EloLogItem {
    fn from(row: EloLogRow) -> Self {
        Self {
            match_id: row.match_id,
            match_type: row.match_type,
            delta: row.elo_after - row.elo_before,
            elo_before: row.elo_before,
            elo_after: row.elo_after,
            created_at: row.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct UserStatsView {
    pub user_id: i64,
    pub singles_elo: f64,
    pub doubles_elo: f64,
    pub singles_streak: i32,
    pub doubles_streak: i32,
    pub total_matches: i32,
    pub total_wins: i32,
    pub total_losses: i32,
    pub cancel_count: i32,
}

impl From<UserStatsRow> for UserStatsView {
    fn from(row: UserStatsRow) -> Self {
        Self {
            user_id: row.user_id,
            singles_elo: row.singles_elo,
            doubles_elo: row.doubles_elo,
            singles_streak: row.singles_streak,
            doubles_streak: row.doubles_streak,
            total_matches: row.total_matches,
            total_wins: row.total_wins,
            total_losses: row.total_losses,
            cancel_count: row.cancel_count,
        }
    }
}

#[derive(Serialize)]
pub struct EventView {
    pub id: i64,
    pub event_type: crate::domain::events::EventType,
    pub match_id: i64,
    pub affected_user_ids: Vec<i64>,
    pub payload: serde_json::Value,
    pub created_at: NaiveDateTime,
}

impl From<EventRow> for EventView {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            event_type: row.event_type,
            match_id: row.match_id,
            affected_user_ids: row.affected_user_ids,
            payload: row.payload,
            created_at: row.created_at,
        }
    }
}
