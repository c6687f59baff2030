use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::settings::AppConfig;
use crate::domain::errors::DomainError;

pub mod applications;
pub mod events;
pub mod matches;
pub mod results;
pub mod users;

pub struct AppState {
    pub pool: Pool<SqliteConnectionManager>,
    pub config: AppConfig,
}

/// Acting identity comes from the X-User-Id header; session mechanics live
/// in front of this service.
pub fn acting_user(headers: &HeaderMap) -> Result<i64, Response> {
    headers
        .get("X-User-Id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok())
        .ok_or_else(|| {
            (StatusCode::UNAUTHORIZED, "Missing or invalid X-User-Id header").into_response()
        })
}

pub fn domain_error_response(err: DomainError) -> Response {
    let status = match &err {
        DomainError::SlotUnavailable | DomainError::AlreadyConfirmed => StatusCode::CONFLICT,
        DomainError::Forbidden => StatusCode::FORBIDDEN,
        DomainError::EditNotAllowed
        | DomainError::InvalidScore(_)
        | DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidSlotTransition { .. }
        | DomainError::Storage(_)
        | DomainError::Pool(_)
        | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("internal error: {err:?}");
    }
    (status, err.to_string()).into_response()
}
