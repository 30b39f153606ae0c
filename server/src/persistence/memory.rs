//! In-process store used by tests and `serve --in-memory`.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::traits::{GameRepository, SettlementLedger, UserRepository};
use super::{PersistenceError, SettlementToken, UserChange};
use crate::model::{Game, User};

#[derive(Default)]
struct Tables {
    games: HashMap<String, Game>,
    users: HashMap<String, User>,
    settlements: HashSet<SettlementToken>,
}

/// HashMap-backed implementation of every repository trait.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded settlement tokens.
    pub fn settlement_count(&self) -> usize {
        self.tables.lock().settlements.len()
    }
}

impl GameRepository for MemoryStore {
    async fn create_game(&self, game: &Game) -> Result<(), PersistenceError> {
        let mut tables = self.tables.lock();
        if tables.games.contains_key(&game.id) {
            return Err(PersistenceError::Duplicate(format!("game {}", game.id)));
        }
        tables.games.insert(game.id.clone(), game.clone());
        Ok(())
    }

    async fn load_game(&self, id: &str) -> Result<Option<Game>, PersistenceError> {
        Ok(self.tables.lock().games.get(id).cloned())
    }

    async fn save_game(&self, game: &Game) -> Result<(), PersistenceError> {
        let mut tables = self.tables.lock();
        match tables.games.get_mut(&game.id) {
            Some(slot) => {
                *slot = game.clone();
                Ok(())
            }
            None => Err(PersistenceError::Missing(format!("game {}", game.id))),
        }
    }

    async fn list_unstarted(&self) -> Result<Vec<Game>, PersistenceError> {
        let tables = self.tables.lock();
        let mut games: Vec<Game> = tables
            .games
            .values()
            .filter(|g| !g.is_started && !g.is_finished)
            .cloned()
            .collect();
        games.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(games)
    }
}

impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), PersistenceError> {
        let mut tables = self.tables.lock();
        if tables.users.contains_key(&user.id) || tables.users.values().any(|u| u.login == user.login) {
            return Err(PersistenceError::Duplicate(format!("user {}", user.login)));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn load_user(&self, id: &str) -> Result<Option<User>, PersistenceError> {
        Ok(self.tables.lock().users.get(id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, PersistenceError> {
        Ok(self
            .tables
            .lock()
            .users
            .values()
            .find(|u| u.login == login)
            .cloned())
    }

    async fn save_user(&self, user: &User) -> Result<(), PersistenceError> {
        let mut tables = self.tables.lock();
        match tables.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(PersistenceError::Missing(format!("user {}", user.id))),
        }
    }
}

impl SettlementLedger for MemoryStore {
    async fn settle_once(
        &self,
        token: &SettlementToken,
        change: &UserChange,
    ) -> Result<bool, PersistenceError> {
        let mut tables = self.tables.lock();
        if tables.settlements.contains(token) {
            return Ok(false);
        }

        let user = tables
            .users
            .get_mut(&token.user_id)
            .ok_or_else(|| PersistenceError::Missing(format!("user {}", token.user_id)))?;
        match change {
            UserChange::RatingDelta(delta) => user.rating += delta,
            UserChange::FinishGame { game_id } => {
                user.games_played += 1;
                if user.cur_game_id.as_deref() == Some(game_id.as_str()) {
                    user.cur_game_id = None;
                }
            }
        }

        tables.settlements.insert(token.clone());
        Ok(true)
    }
}
