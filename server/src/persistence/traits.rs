//! Async repository trait definitions for the persistence layer.
//!
//! Each trait abstracts over one aggregate so that the in-memory and SQLite
//! backends can be used interchangeably via static dispatch.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send`, which task workers spawned with
//! `tokio::spawn` require.

use super::{PersistenceError, SettlementToken, UserChange};
use crate::model::{Game, User};
use std::future::Future;

/// Repository for game records.
pub trait GameRepository: Send + Sync {
    /// Insert a new game. Fails with [`PersistenceError::Duplicate`] if the id exists.
    fn create_game(&self, game: &Game) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    fn load_game(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Game>, PersistenceError>> + Send;
    /// Overwrite the mutable fields of an existing game.
    fn save_game(&self, game: &Game) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    /// Games that were matched but never started, oldest first.
    fn list_unstarted(&self) -> impl Future<Output = Result<Vec<Game>, PersistenceError>> + Send;
}

/// Repository for user records.
///
/// Writers must hold the user's lease; the store itself does not serialize
/// concurrent read-modify-write cycles.
pub trait UserRepository: Send + Sync {
    fn create_user(&self, user: &User) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    fn load_user(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<User>, PersistenceError>> + Send;
    fn find_user_by_login(
        &self,
        login: &str,
    ) -> impl Future<Output = Result<Option<User>, PersistenceError>> + Send;
    fn save_user(&self, user: &User) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// Dedup table for settlements.
///
/// `settle_once` records `token` and applies `change` to the token's user
/// atomically. It returns `false` without touching the user when the token
/// was already recorded.
pub trait SettlementLedger: Send + Sync {
    fn settle_once(
        &self,
        token: &SettlementToken,
        change: &UserChange,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
}

/// Everything the orchestrator needs from a backend.
pub trait SessionStore: GameRepository + UserRepository + SettlementLedger + 'static {}

impl<T> SessionStore for T where T: GameRepository + UserRepository + SettlementLedger + 'static {}
