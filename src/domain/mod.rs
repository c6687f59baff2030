pub mod errors;
pub mod events;
pub mod models;
pub mod score;

pub use errors::{DomainError, DomainResult};
pub use events::{DomainEvent, EventType};
pub use models::{ApplicationStatus, MatchFormat, MatchStatus, SlotStatus};
pub use score::{Outcome, ReportedScore, SetScore};
