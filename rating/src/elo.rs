use serde::{Deserialize, Serialize};

use crate::KFactor;

/// Result of a game from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Score {
    Win,
    Draw,
    Loss,
}

/// Rating change a player would receive for each possible outcome.
///
/// Deltas are signed: `lose` is non-positive whenever the expected score is
/// non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingDelta {
    pub win: f64,
    pub draw: f64,
    pub lose: f64,
}

/// Whole-point view of a [`RatingDelta`] shown to players before a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingPreview {
    pub win: i32,
    pub draw: i32,
    pub lose: i32,
}

/// Deltas for both sides of one game, computed from the same rating snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameDeltas {
    pub white: RatingDelta,
    pub black: RatingDelta,
}

impl RatingDelta {
    /// Select the delta matching the player's actual score.
    pub fn for_score(&self, score: Score) -> f64 {
        match score {
            Score::Win => self.win,
            Score::Draw => self.draw,
            Score::Loss => self.lose,
        }
    }

    /// Truncate toward zero. Settlement always uses the exact values.
    pub fn preview(&self) -> RatingPreview {
        RatingPreview {
            win: self.win.trunc() as i32,
            draw: self.draw.trunc() as i32,
            lose: self.lose.trunc() as i32,
        }
    }
}

/// Probability-weighted expectation of `rating_self` scoring against
/// `rating_opponent`.
pub fn expected_score(rating_self: f64, rating_opponent: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((rating_opponent - rating_self) / 400.0))
}

/// Per-outcome deltas for a player with K-factor `k` and expected score `e`.
pub fn rating_deltas(k: KFactor, expected: f64) -> RatingDelta {
    let k = f64::from(k.value());
    RatingDelta {
        win: k * (1.0 - expected),
        draw: k * (0.5 - expected),
        lose: k * (0.0 - expected),
    }
}

/// Deltas for both players. Each side's expected score comes from the other
/// side's rating; each side's K-factor is its own.
pub fn deltas_for_game(
    rating_white: f64,
    k_white: KFactor,
    rating_black: f64,
    k_black: KFactor,
) -> GameDeltas {
    GameDeltas {
        white: rating_deltas(k_white, expected_score(rating_white, rating_black)),
        black: rating_deltas(k_black, expected_score(rating_black, rating_white)),
    }
}
