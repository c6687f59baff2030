use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::{
    applications::{apply_to_slot, cancel_application, confirm_application, reject_application},
    events::list_events,
    matches::{create_match, edit_match, force_cancel_match, get_match_detail, list_matches},
    results::{dispute_result, submit_result},
    users::{get_user_history, get_user_stats},
    AppState,
};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/matches", post(create_match).get(list_matches))
        .route("/api/matches/:id", get(get_match_detail).put(edit_match))
        .route("/api/matches/:id/cancel", post(force_cancel_match))
        .route("/api/matches/:id/result", post(submit_result))
        .route("/api/matches/:id/dispute", post(dispute_result))
        .route("/api/slots/:id/apply", post(apply_to_slot))
        .route("/api/applications/:id/confirm", post(confirm_application))
        .route("/api/applications/:id/reject", post(reject_application))
        .route("/api/applications/:id/cancel", post(cancel_application))
        .route("/api/users/:id/history", get(get_user_history))
        .route("/api/users/:id/stats", get(get_user_stats))
        .route("/api/events", get(list_events))
        .with_state(state)
}
