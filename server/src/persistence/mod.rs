mod memory;
pub mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::{Database, PoolConfig, SqliteStore};
pub use traits::{GameRepository, SessionStore, SettlementLedger, UserRepository};

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    #[error("Missing row: {0}")]
    Missing(String),
    #[error("Duplicate row: {0}")]
    Duplicate(String),
}

/// Which follow-up effect of a finished game a token guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettlementKind {
    Rating,
    GamesPlayed,
}

impl SettlementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rating => "rating",
            Self::GamesPlayed => "games_played",
        }
    }
}

/// Idempotency key for a per-player settlement of one game.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettlementToken {
    pub game_id: String,
    pub user_id: String,
    pub kind: SettlementKind,
}

impl SettlementToken {
    pub fn rating(game_id: &str, user_id: &str) -> Self {
        Self {
            game_id: game_id.to_string(),
            user_id: user_id.to_string(),
            kind: SettlementKind::Rating,
        }
    }

    pub fn games_played(game_id: &str, user_id: &str) -> Self {
        Self {
            game_id: game_id.to_string(),
            user_id: user_id.to_string(),
            kind: SettlementKind::GamesPlayed,
        }
    }
}

impl fmt::Display for SettlementToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.game_id, self.user_id, self.kind.as_str())
    }
}

/// User mutation applied together with recording its settlement token.
#[derive(Debug, Clone, PartialEq)]
pub enum UserChange {
    /// Add the delta to the user's rating.
    RatingDelta(f64),
    /// Count the game and release the user's current-game slot if it still
    /// points at this game.
    FinishGame { game_id: String },
}

/// Generate a unique game ID.
pub fn generate_game_id() -> String {
    format!("game_{}", uuid::Uuid::new_v4().simple())
}

/// Generate a unique user ID.
pub fn generate_user_id() -> String {
    format!("user_{}", uuid::Uuid::new_v4().simple())
}

/// Get the current unix timestamp in seconds.
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
