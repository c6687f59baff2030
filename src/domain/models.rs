use serde::{Deserialize, Serialize};
use std::fmt;

/// Error raised when a status string from storage (or a request) does not
/// name a known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle of a match, derived from its slots and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Confirmed => "confirmed",
            MatchStatus::Completed => "completed",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseStatusError> {
        match value {
            "pending" => Ok(MatchStatus::Pending),
            "confirmed" => Ok(MatchStatus::Confirmed),
            "completed" => Ok(MatchStatus::Completed),
            "cancelled" => Ok(MatchStatus::Cancelled),
            other => Err(ParseStatusError {
                kind: "match status",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Completed | MatchStatus::Cancelled)
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State machine of a single bookable slot:
/// available → locked → confirmed → completed, with cancelled reachable
/// from available/locked/confirmed. Completed and cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Locked,
    Confirmed,
    Completed,
    Cancelled,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Locked => "locked",
            SlotStatus::Confirmed => "confirmed",
            SlotStatus::Completed => "completed",
            SlotStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseStatusError> {
        match value {
            "available" => Ok(SlotStatus::Available),
            "locked" => Ok(SlotStatus::Locked),
            "confirmed" => Ok(SlotStatus::Confirmed),
            "completed" => Ok(SlotStatus::Completed),
            "cancelled" => Ok(SlotStatus::Cancelled),
            other => Err(ParseStatusError {
                kind: "slot status",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotStatus::Completed | SlotStatus::Cancelled)
    }

    /// Whether the slot may move from `self` to `next`.
    pub fn can_transition_to(&self, next: SlotStatus) -> bool {
        use SlotStatus::*;
        matches!(
            (self, next),
            (Available, Locked)
                | (Locked, Available)
                | (Locked, Confirmed)
                | (Confirmed, Available) // confirmed application cancelled
                | (Confirmed, Completed)
                | (Available, Cancelled)
                | (Locked, Cancelled)
                | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Confirmed,
    Rejected,
    Waitlisted,
    Expired,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Confirmed => "confirmed",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Waitlisted => "waitlisted",
            ApplicationStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseStatusError> {
        match value {
            "pending" => Ok(ApplicationStatus::Pending),
            "confirmed" => Ok(ApplicationStatus::Confirmed),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "waitlisted" => Ok(ApplicationStatus::Waitlisted),
            "expired" => Ok(ApplicationStatus::Expired),
            other => Err(ParseStatusError {
                kind: "application status",
                value: other.to_string(),
            }),
        }
    }

    /// Still competing for the slot.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Pending
                | ApplicationStatus::Confirmed
                | ApplicationStatus::Waitlisted
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchFormat {
    Singles,
    Doubles,
}

impl MatchFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchFormat::Singles => "singles",
            MatchFormat::Doubles => "doubles",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseStatusError> {
        match value {
            "singles" => Ok(MatchFormat::Singles),
            "doubles" => Ok(MatchFormat::Doubles),
            other => Err(ParseStatusError {
                kind: "match format",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for MatchFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
