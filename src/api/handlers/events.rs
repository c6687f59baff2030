use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::AppState;
use crate::api::models::{EventView, EventsParams};
use crate::database::events;

/// Outbox peek for the notification collaborator: logical events in id
/// order, resumable via `after`.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsParams>,
) -> impl IntoResponse {
    let conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "DB Connection Error").into_response(),
    };

    let after = params.after.unwrap_or(0);
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);

    match events::list_events(&conn, after, limit) {
        Ok(rows) => {
            let views: Vec<EventView> = rows.into_iter().map(Into::into).collect();
            Json(views).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Query Error: {}", e)).into_response(),
    }
}
