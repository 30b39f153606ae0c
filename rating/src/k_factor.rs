use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Games a player must complete before leaving the provisional tier.
pub const PROVISIONAL_GAMES: u32 = 30;

/// Rating at which an established player moves to the master tier.
pub const MASTER_RATING: f64 = 2400.0;

/// Development coefficient. Only three values are ever valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum KFactor {
    /// 40, new players.
    #[default]
    Provisional,
    /// 20, established players below master strength.
    Standard,
    /// 10, permanent once reached.
    Master,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid K-factor {0}: expected 40, 20 or 10")]
pub struct InvalidKFactor(pub u8);

impl KFactor {
    pub fn value(self) -> u8 {
        match self {
            KFactor::Provisional => 40,
            KFactor::Standard => 20,
            KFactor::Master => 10,
        }
    }
}

impl TryFrom<u8> for KFactor {
    type Error = InvalidKFactor;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            40 => Ok(KFactor::Provisional),
            20 => Ok(KFactor::Standard),
            10 => Ok(KFactor::Master),
            other => Err(InvalidKFactor(other)),
        }
    }
}

impl From<KFactor> for u8 {
    fn from(k: KFactor) -> Self {
        k.value()
    }
}

impl std::fmt::Display for KFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Tier a player belongs in after a settled game.
///
/// Transitions only ever lower K. A provisional player who already qualifies
/// for master drops both tiers in one call.
pub fn next_k_factor(current: KFactor, games_played: u32, rating: f64) -> KFactor {
    let mut k = current;
    if k == KFactor::Provisional && games_played >= PROVISIONAL_GAMES {
        k = KFactor::Standard;
    }
    if k == KFactor::Standard && games_played >= PROVISIONAL_GAMES && rating >= MASTER_RATING {
        k = KFactor::Master;
    }
    k
}
