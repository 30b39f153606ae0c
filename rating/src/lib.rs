//! Elo rating engine.
//!
//! Pure functions only: expected score, per-outcome rating deltas for a game
//! and the FIDE (post-2014) K-factor tiering. Callers are responsible for
//! reading both players' ratings from one consistent snapshot before calling
//! [`deltas_for_game`].

mod elo;
mod k_factor;

pub use elo::{
    deltas_for_game, expected_score, rating_deltas, GameDeltas, RatingDelta, RatingPreview, Score,
};
pub use k_factor::{next_k_factor, InvalidKFactor, KFactor, MASTER_RATING, PROVISIONAL_GAMES};

/// Rating assigned to a freshly registered player.
pub const DEFAULT_RATING: f64 = 1200.0;
