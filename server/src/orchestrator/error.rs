use chess::FenError;

use crate::dispatch::{DispatchError, Retryable};
use crate::locks::LockError;
use crate::persistence::PersistenceError;

/// Failure of one orchestrator transition.
///
/// Illegal transitions are not errors; they return `Ok(())` after logging.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("game not found: {0}")]
    GameNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("game {game_id} has a corrupt board: {source}")]
    CorruptBoard {
        game_id: String,
        #[source]
        source: FenError,
    },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl Retryable for TaskError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Lock(_) | Self::Persistence(_) | Self::Dispatch(_)
        )
    }
}
