use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::{acting_user, domain_error_response, AppState};
use crate::api::models::{ApplicationView, ApplyRequest};
use crate::services::ApplicationEngine;

pub async fn apply_to_slot(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ApplyRequest>,
) -> impl IntoResponse {
    let applicant_id = match acting_user(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let mut conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "DB Connection Error").into_response(),
    };

    let engine = ApplicationEngine::new(&state.config);
    match engine.apply(
        &mut conn,
        slot_id,
        applicant_id,
        request.guest_partner_name.as_deref(),
    ) {
        Ok(application) => {
            (StatusCode::CREATED, Json(ApplicationView::from(application))).into_response()
        }
        Err(e) => domain_error_response(e),
    }
}

pub async fn confirm_application(
    State(state): State<Arc<AppState>>,
    Path(application_id): Path<i64>,
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

    let engine = ApplicationEngine::new(&state.config);
    match engine.confirm_application(&mut conn, application_id, acting_user_id) {
        Ok(application) => Json(ApplicationView::from(application)).into_response(),
        Err(e) => domain_error_response(e),
    }
}

pub async fn reject_application(
    State(state): State<Arc<AppState>>,
    Path(application_id): Path<i64>,
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

    let engine = ApplicationEngine::new(&state.config);
    match engine.reject_application(&mut conn, application_id, acting_user_id) {
        Ok(application) => Json(ApplicationView::from(application)).into_response(),
        Err(e) => domain_error_response(e),
    }
}

pub async fn cancel_application(
    State(state): State<Arc<AppState>>,
    Path(application_id): Path<i64>,
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

    let engine = ApplicationEngine::new(&state.config);
    match engine.cancel_confirmed_application(&mut conn, application_id, acting_user_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => domain_error_response(e),
    }
}
