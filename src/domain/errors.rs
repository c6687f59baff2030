use super::models::SlotStatus;

/// Expected, user-facing outcomes of core operations. These are returned as
/// values and matched on; they are never used for internal control flow.
/// Infrastructure failures ride along in the `Storage`/`Pool`/`Internal`
/// variants and always roll the enclosing transaction back.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Lock/state conflict; the caller may re-poll and retry.
    #[error("slot is unavailable")]
    SlotUnavailable,

    /// State-machine violation, indicates a logic bug in the caller.
    #[error("invalid slot transition: {from} -> {to}")]
    InvalidSlotTransition { from: SlotStatus, to: SlotStatus },

    #[error("forbidden")]
    Forbidden,

    /// The race for the slot was lost; refresh and re-apply to the waitlist.
    #[error("slot already has a confirmed application")]
    AlreadyConfirmed,

    #[error("match can no longer be edited")]
    EditNotAllowed,

    #[error("invalid score: {0}")]
    InvalidScore(String),

    /// Malformed or inconsistent request data.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Conflicts are worth retrying after a refresh; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::SlotUnavailable | DomainError::Storage(_) | DomainError::Pool(_)
        )
    }
}
