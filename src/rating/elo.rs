use crate::config::settings::RatingSettings;
use crate::domain::models::MatchFormat;

/// Probability that `rating` beats `opponent` under the logistic model.
pub fn expected_outcome(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

/// One ELO step: outcome is 1.0 for a win, 0.0 for a loss.
pub fn updated_rating(rating: f64, opponent: f64, outcome: f64, k: f64) -> f64 {
    rating + k * (outcome - expected_outcome(rating, opponent))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingUpdate {
    pub winner_before: f64,
    pub winner_after: f64,
    pub loser_before: f64,
    pub loser_after: f64,
}

/// Rate one completed match. Deterministic, no I/O.
pub fn rate_match(
    winner_before: f64,
    loser_before: f64,
    format: MatchFormat,
    settings: &RatingSettings,
) -> RatingUpdate {
    let k = k_factor(format, settings);
    RatingUpdate {
        winner_before,
        winner_after: updated_rating(winner_before, loser_before, 1.0, k),
        loser_before,
        loser_after: updated_rating(loser_before, winner_before, 0.0, k),
    }
}

pub fn k_factor(format: MatchFormat, settings: &RatingSettings) -> f64 {
    match format {
        MatchFormat::Singles => settings.k_singles,
        MatchFormat::Doubles => settings.k_doubles,
    }
}
