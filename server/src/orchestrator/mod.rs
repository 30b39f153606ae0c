//! Game session orchestrator.
//!
//! Drives a game through `pending -> started -> finished` and settles the
//! players afterwards. Every entry point is an idempotent transition run by a
//! worker: game-level transitions hold the game lease, user writes hold the
//! user lease, and settlements are gated by ledger tokens so redelivery never
//! applies an effect twice.
//!
//! The orchestrator never retries on its own. Failures surface as
//! [`TaskError`] and the worker pool decides.

mod chat;
mod error;
mod finalize;
mod moves;
mod reconnect;
mod settlement;
mod start;

#[cfg(test)]
mod tests;

pub use error::TaskError;
pub use reconnect::ChannelBinding;

use std::sync::Arc;
use std::time::Duration;

use chess::{FenError, Side, Terminal};
use rating::{expected_score, rating_deltas};

use crate::dispatch::{SessionTask, TaskHandler, TaskQueue};
use crate::locks::LeaseLocks;
use crate::model::{Game, GameResult, User};
use crate::notify::{Notifier, SessionState};
use crate::persistence::SessionStore;

pub struct Orchestrator<S: SessionStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    queue: Arc<dyn TaskQueue>,
    locks: LeaseLocks,
    k_factor_delay: Duration,
}

impl<S: SessionStore> Orchestrator<S> {
    pub fn new(
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
        queue: Arc<dyn TaskQueue>,
        locks: LeaseLocks,
        k_factor_delay: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            queue,
            locks,
            k_factor_delay,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Re-enqueue `start_session` for every game that was matched but never
    /// started. Called once at boot.
    pub async fn recover_pending(&self) -> Result<usize, TaskError> {
        let pending = self.store.list_unstarted().await?;
        for game in &pending {
            tracing::info!(game_id = %game.id, "Recovering pending session");
            self.queue.submit(SessionTask::StartSession {
                game_id: game.id.clone(),
            })?;
        }
        Ok(pending.len())
    }

    async fn require_game(&self, game_id: &str) -> Result<Game, TaskError> {
        self.store
            .load_game(game_id)
            .await?
            .ok_or_else(|| TaskError::GameNotFound(game_id.to_string()))
    }

    async fn require_user(&self, user_id: &str) -> Result<User, TaskError> {
        self.store
            .load_user(user_id)
            .await?
            .ok_or_else(|| TaskError::UserNotFound(user_id.to_string()))
    }

    /// Load-modify-save of one user under its lease. `edit` returns whether
    /// anything changed; unchanged users are not written.
    async fn update_user<F>(&self, user_id: &str, edit: F) -> Result<User, TaskError>
    where
        F: FnOnce(&mut User) -> bool + Send,
    {
        let lease = self.locks.acquire_user(user_id).await?;
        let mut user = self.require_user(user_id).await?;
        if edit(&mut user) {
            lease.ensure_held()?;
            self.store.save_user(&user).await?;
        }
        Ok(user)
    }
}

fn corrupt_board(game_id: &str) -> impl FnOnce(FenError) -> TaskError + '_ {
    move |source| TaskError::CorruptBoard {
        game_id: game_id.to_string(),
        source,
    }
}

/// Snapshot for one player, with a preview from both current ratings.
fn session_state(board_state: &str, color: Side, me: &User, opponent: &User) -> SessionState {
    let preview = rating_deltas(me.k_factor, expected_score(me.rating, opponent.rating));
    SessionState {
        board_state: board_state.to_string(),
        color,
        opponent_login: opponent.login.clone(),
        opponent_rating: opponent.rating.trunc() as i64,
        rating_preview: preview.preview(),
    }
}

fn finalize_task(game_id: &str, terminal: Terminal) -> SessionTask {
    SessionTask::FinalizeSession {
        game_id: game_id.to_string(),
        result: GameResult::from(terminal.outcome),
        reason: terminal.reason.as_str().to_string(),
        settle_ratings: true,
    }
}

impl<S: SessionStore> TaskHandler for Orchestrator<S> {
    type Error = TaskError;

    async fn handle(&self, task: SessionTask) -> Result<(), TaskError> {
        match task {
            SessionTask::StartSession { game_id } => self.start(&game_id).await,
            SessionTask::ApplySessionMove {
                game_id,
                user_id,
                move_notation,
            } => self.apply_move(&game_id, &user_id, &move_notation).await,
            SessionTask::ReconnectSession { game_id, user_id } => {
                self.reconnect(&game_id, &user_id).await
            }
            SessionTask::FinalizeSession {
                game_id,
                result,
                reason,
                settle_ratings,
            } => {
                self.finalize(&game_id, result, &reason, settle_ratings)
                    .await
            }
            SessionTask::SettleRating {
                game_id,
                user_id,
                delta,
            } => self.settle_rating(&game_id, &user_id, delta).await,
            SessionTask::RecomputeKFactor { user_id } => self.recompute_k_factor(&user_id).await,
            SessionTask::ResignSession { game_id, user_id } => {
                self.resign(&game_id, &user_id).await
            }
            SessionTask::SendMessage {
                game_id,
                sender,
                message,
            } => self.send_message(&game_id, &sender, &message).await,
        }
    }
}
