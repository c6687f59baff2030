use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DomainError;

/// Games won in one set, read from the submitter's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    pub games_for: u8,
    pub games_against: u8,
}

impl SetScore {
    pub fn new(games_for: u8, games_against: u8) -> Self {
        Self {
            games_for,
            games_against,
        }
    }

    /// A complete set: winner reaches 6 with a 2-game margin, or takes it
    /// 7-5, or wins the tiebreak 7-6.
    pub fn is_complete(&self) -> bool {
        let (hi, lo) = if self.games_for >= self.games_against {
            (self.games_for, self.games_against)
        } else {
            (self.games_against, self.games_for)
        };
        if hi == lo {
            return false;
        }
        match hi {
            6 => lo <= 4,
            7 => lo == 5 || lo == 6,
            _ => false,
        }
    }

    pub fn won_by_submitter(&self) -> bool {
        self.games_for > self.games_against
    }
}

impl fmt::Display for SetScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.games_for, self.games_against)
    }
}

/// A reported outcome, parsed once at the API boundary. Set scores are from
/// the submitter's perspective; the two flagged variants mean the submitter
/// won without a decidable set count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportedScore {
    CompletedSets { sets: Vec<SetScore> },
    WonByDefault,
    RetiredAfter { sets: Vec<SetScore> },
}

/// Who won, from the submitter's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    SubmitterWon,
    SubmitterLost,
}

impl ReportedScore {
    /// Parse a score string like "6-4 6-3" (separators: whitespace or
    /// commas) together with the two boundary flags.
    pub fn parse(
        text: &str,
        won_by_default: bool,
        opponent_retired: bool,
    ) -> Result<Self, DomainError> {
        if won_by_default && opponent_retired {
            return Err(DomainError::InvalidScore(
                "won_by_default and opponent_retired are mutually exclusive".to_string(),
            ));
        }

        if won_by_default {
            if !text.trim().is_empty() {
                return Err(DomainError::InvalidScore(
                    "a walkover carries no set scores".to_string(),
                ));
            }
            return Ok(ReportedScore::WonByDefault);
        }

        let sets = parse_sets(text)?;
        if opponent_retired {
            return Ok(ReportedScore::RetiredAfter { sets });
        }

        if sets.is_empty() {
            return Err(DomainError::InvalidScore("no sets given".to_string()));
        }
        Ok(ReportedScore::CompletedSets { sets })
    }

    /// Determine the winner, or fail with `InvalidScore` if the data is
    /// undecidable. Best of 3: the winner must take exactly 2 sets.
    pub fn decide(&self) -> Result<Outcome, DomainError> {
        match self {
            ReportedScore::WonByDefault => Ok(Outcome::SubmitterWon),
            ReportedScore::RetiredAfter { .. } => Ok(Outcome::SubmitterWon),
            ReportedScore::CompletedSets { sets } => decide_sets(sets),
        }
    }

    /// Canonical rendering, persisted as the result's score text.
    pub fn render(&self) -> String {
        match self {
            ReportedScore::WonByDefault => "walkover".to_string(),
            ReportedScore::RetiredAfter { sets } => {
                if sets.is_empty() {
                    "ret.".to_string()
                } else {
                    format!("{} ret.", join_sets(sets))
                }
            }
            ReportedScore::CompletedSets { sets } => join_sets(sets),
        }
    }
}

fn join_sets(sets: &[SetScore]) -> String {
    sets.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_sets(text: &str) -> Result<Vec<SetScore>, DomainError> {
    let mut sets = Vec::new();
    for token in text.split([' ', ',']).filter(|t| !t.trim().is_empty()) {
        sets.push(parse_one_set(token.trim())?);
    }
    if sets.len() > 3 {
        return Err(DomainError::InvalidScore(format!(
            "expected at most 3 sets, got {}",
            sets.len()
        )));
    }
    Ok(sets)
}

fn parse_one_set(token: &str) -> Result<SetScore, DomainError> {
    let (left, right) = token
        .split_once(['-', ':'])
        .ok_or_else(|| DomainError::InvalidScore(format!("malformed set: {token}")))?;
    let games_for = parse_games(left, token)?;
    let games_against = parse_games(right, token)?;
    Ok(SetScore::new(games_for, games_against))
}

fn parse_games(part: &str, token: &str) -> Result<u8, DomainError> {
    let games: u8 = part
        .trim()
        .parse()
        .map_err(|_| DomainError::InvalidScore(format!("malformed set: {token}")))?;
    // No set, tiebreak included, goes past 7 games.
    if games > 7 {
        return Err(DomainError::InvalidScore(format!(
            "impossible game count in set: {token}"
        )));
    }
    Ok(games)
}

fn decide_sets(sets: &[SetScore]) -> Result<Outcome, DomainError> {
    let mut won = 0u8;
    let mut lost = 0u8;
    for set in sets {
        if !set.is_complete() {
            return Err(DomainError::InvalidScore(format!(
                "incomplete set without a retirement flag: {set}"
            )));
        }
        if set.won_by_submitter() {
            won += 1;
        } else {
            lost += 1;
        }
    }
    match (won, lost) {
        (2, 0) | (2, 1) => Ok(Outcome::SubmitterWon),
        (0, 2) | (1, 2) => Ok(Outcome::SubmitterLost),
        _ => Err(DomainError::InvalidScore(format!(
            "no winner decidable from {won}-{lost} sets"
        ))),
    }
}
