//! SQLite-backed repository implementations.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer and multiple concurrent readers.
//! - **A busy timeout** from [`PoolConfig`], so concurrent workers queue for
//!   the write lock instead of failing with `SQLITE_BUSY`.
//! - **Foreign keys enabled**, enforced at the connection level.
//! - **Embedded migrations**: `sqlx::migrate!` runs `migrations/001_initial_schema.sql`
//!   automatically when [`Database::open`] is called. The schema is idempotent.
//!
//! ## Store
//!
//! [`SqliteStore`] holds the pool and implements every trait from
//! [`crate::persistence`], one file per trait:
//!
//! | File | Trait |
//! |------|-------|
//! | `game_repo.rs` | `GameRepository` |
//! | `user_repo.rs` | `UserRepository` |
//! | `ledger_repo.rs` | `SettlementLedger` |
//!
//! `settle_once` records the token and updates the user row in one
//! transaction, so a crash between the two cannot double-apply a settlement.

mod database;
mod game_repo;
pub(crate) mod helpers;
mod ledger_repo;
mod user_repo;

pub use database::{Database, PoolConfig};

use sqlx::SqlitePool;

/// SQLite implementation of [`crate::persistence::SessionStore`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[cfg(test)]
pub(crate) async fn test_store() -> SqliteStore {
    let db = Database::new_in_memory().await.unwrap();
    SqliteStore::new(&db)
}
