use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::{acting_user, domain_error_response, AppState};
use crate::api::models::{ResultView, SubmitResultRequest};
use crate::domain::score::ReportedScore;
use crate::services::ResultPipeline;

pub async fn submit_result(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<SubmitResultRequest>,
) -> impl IntoResponse {
    let submitter_id = match acting_user(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    // The score string is parsed exactly once, here at the boundary.
    let score = match ReportedScore::parse(
        &request.score,
        request.won_by_default,
        request.opponent_retired,
    ) {
        Ok(score) => score,
        Err(e) => return domain_error_response(e),
    };

    let mut conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "DB Connection Error").into_response(),
    };

    let pipeline = ResultPipeline::new(state.config.clone());
    match pipeline.submit_result(&mut conn, match_id, submitter_id, &score) {
        Ok(result) => (StatusCode::CREATED, Json(ResultView::from(result))).into_response(),
        Err(e) => domain_error_response(e),
    }
}

pub async fn dispute_result(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let acting_user_id = match acting_user(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "DB Connection Error").into_response(),
    };

    let pipeline = ResultPipeline::new(state.config.clone());
    match pipeline.dispute_result(&mut conn, match_id, acting_user_id) {
        Ok(result) => Json(ResultView::from(result)).into_response(),
        Err(e) => domain_error_response(e),
    }
}
