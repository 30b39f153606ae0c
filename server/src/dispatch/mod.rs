//! Task definitions and the queue boundary.
//!
//! Every state transition of a session is expressed as a [`SessionTask`] and
//! runs on a worker. Handlers may be executed more than once for the same task
//! (retries, recovery), so each one must be idempotent.

mod worker;

pub use worker::{TaskEnvelope, TaskHandler, TaskSender, WorkerConfig, WorkerPool};

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::GameResult;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum SessionTask {
    StartSession {
        game_id: String,
    },
    ApplySessionMove {
        game_id: String,
        user_id: String,
        move_notation: String,
    },
    ReconnectSession {
        game_id: String,
        user_id: String,
    },
    FinalizeSession {
        game_id: String,
        result: GameResult,
        #[serde(default)]
        reason: String,
        #[serde(default = "default_true")]
        settle_ratings: bool,
    },
    SettleRating {
        game_id: String,
        user_id: String,
        delta: f64,
    },
    RecomputeKFactor {
        user_id: String,
    },
    ResignSession {
        game_id: String,
        user_id: String,
    },
    SendMessage {
        game_id: String,
        sender: String,
        message: String,
    },
}

impl SessionTask {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartSession { .. } => "start_session",
            Self::ApplySessionMove { .. } => "apply_session_move",
            Self::ReconnectSession { .. } => "reconnect_session",
            Self::FinalizeSession { .. } => "finalize_session",
            Self::SettleRating { .. } => "settle_rating",
            Self::RecomputeKFactor { .. } => "recompute_k_factor",
            Self::ResignSession { .. } => "resign_session",
            Self::SendMessage { .. } => "send_message",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("task queue is closed")]
    Closed,
}

/// Where handlers and the gateway submit follow-up work.
pub trait TaskQueue: Send + Sync {
    fn submit(&self, task: SessionTask) -> Result<(), DispatchError>;

    /// Run `task` no earlier than `delay` from now.
    fn submit_delayed(&self, task: SessionTask, delay: Duration) -> Result<(), DispatchError>;
}

/// Errors that may succeed if the same task runs again.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}
