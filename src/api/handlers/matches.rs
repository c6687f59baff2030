use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::{acting_user, domain_error_response, AppState};
use crate::api::models::{
    CreateMatchRequest, EditMatchRequest, ForceCancelRequest, MatchDetailView, MatchListParams,
    MatchView, SlotView,
};
use crate::database::{self, matches};
use crate::services::lifecycle::{MatchLifecycle, NewMatchRequest};

pub async fn create_match(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateMatchRequest>,
) -> impl IntoResponse {
    let creator_id = match acting_user(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "DB Connection Error").into_response(),
    };

    let lifecycle = MatchLifecycle::new(state.config.clone());
    let new_match = NewMatchRequest {
        creator_id,
        court_id: request.court_id,
        date: request.date,
        format: request.format,
        skill_min: request.skill_min,
        skill_max: request.skill_max,
        gender_filter: request.gender_filter.as_deref(),
        surface_filter: request.surface_filter.as_deref(),
        max_distance_km: request.max_distance_km,
        slots: request
            .slots
            .iter()
            .map(|w| (w.start_time, w.end_time))
            .collect(),
    };

    match lifecycle.create_match(&mut conn, &new_match) {
        Ok(detail) => {
            let view = MatchDetailView {
                match_view: detail.match_row.into(),
                slots: detail
                    .slots
                    .into_iter()
                    .map(|(slot, apps)| SlotView::from_row(slot, apps))
                    .collect(),
            };
            (StatusCode::CREATED, Json(view)).into_response()
        }
        Err(e) => domain_error_response(e),
    }
}

pub async fn list_matches(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MatchListParams>,
) -> impl IntoResponse {
    let conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "DB Connection Error").into_response(),
    };

    match matches::list_matches(&conn, params.status) {
        Ok(rows) => {
            let views: Vec<MatchView> = rows.into_iter().map(Into::into).collect();
            Json(views).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Query Error: {}", e)).into_response(),
    }
}

pub async fn get_match_detail(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
) -> impl IntoResponse {
    let conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "DB Connection Error").into_response(),
    };

    let lifecycle = MatchLifecycle::new(state.config.clone());
    match lifecycle.get_match_detail(&conn, match_id) {
        Ok(detail) => {
            let view = MatchDetailView {
                match_view: detail.match_row.into(),
                slots: detail
                    .slots
                    .into_iter()
                    .map(|(slot, apps)| SlotView::from_row(slot, apps))
                    .collect(),
            };
            Json(view).into_response()
        }
        Err(e) => domain_error_response(e),
    }
}

pub async fn edit_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<EditMatchRequest>,
) -> impl IntoResponse {
    let acting_user_id = match acting_user(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "DB Connection Error").into_response(),
    };

    let edit = database::matches::MatchEdit {
        court_id: request.court_id,
        date: request.date,
        skill_min: request.skill_min,
        skill_max: request.skill_max,
        gender_filter: request.gender_filter.as_deref(),
        surface_filter: request.surface_filter.as_deref(),
        max_distance_km: request.max_distance_km,
    };

    let lifecycle = MatchLifecycle::new(state.config.clone());
    match lifecycle.edit_match(&mut conn, match_id, acting_user_id, &edit) {
        Ok(row) => Json(MatchView::from(row)).into_response(),
        Err(e) => domain_error_response(e),
    }
}

pub async fn force_cancel_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ForceCancelRequest>,
) -> impl IntoResponse {
    let acting_user_id = match acting_user(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "DB Connection Error").into_response(),
    };

    let lifecycle = MatchLifecycle::new(state.config.clone());
    match lifecycle.force_cancel(&mut conn, match_id, &request.reason, acting_user_id) {
        Ok(row) => Json(MatchView::from(row)).into_response(),
        Err(e) => domain_error_response(e),
    }
}
