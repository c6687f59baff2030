use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical notification events emitted by the core. Channel selection,
/// deduplication and delivery retries belong to the notification
/// collaborator reading the outbox; the core only appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SlotApply,
    ApplicationConfirmed,
    ApplicationRejected,
    ApplicationCancelled,
    MatchForceCancelled,
    ResultAccepted,
    ResultDisputed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SlotApply => "slot_apply",
            EventType::ApplicationConfirmed => "application_confirmed",
            EventType::ApplicationRejected => "application_rejected",
            EventType::ApplicationCancelled => "application_cancelled",
            EventType::MatchForceCancelled => "match_force_cancelled",
            EventType::ResultAccepted => "result_accepted",
            EventType::ResultDisputed => "result_disputed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_type: EventType,
    pub match_id: i64,
    pub affected_user_ids: Vec<i64>,
    pub payload: Value,
}

impl DomainEvent {
    pub fn new(
        event_type: EventType,
        match_id: i64,
        affected_user_ids: Vec<i64>,
        payload: Value,
    ) -> Self {
        Self {
            event_type,
            match_id,
            affected_user_ids,
            payload,
        }
    }
}
