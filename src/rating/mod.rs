pub mod elo;

pub use elo::{expected_outcome, k_factor, rate_match, updated_rating, RatingUpdate};
