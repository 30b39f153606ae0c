//! Shared encode/decode helpers for SQLite ↔ domain type conversions.
//!
//! These functions bridge the gap between domain types and the string/integer
//! columns used in the SQLite schema's CHECK constraints.

use rating::KFactor;

use crate::model::{Closing, GameResult};
use crate::persistence::PersistenceError;

// ── GameResult ─────────────────────────────────────────────────────────

pub fn encode_result(result: Option<GameResult>) -> Option<&'static str> {
    result.map(GameResult::as_str)
}

pub fn decode_result(raw: Option<String>) -> Result<Option<GameResult>, PersistenceError> {
    raw.map(|s| {
        s.parse::<GameResult>()
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))
    })
    .transpose()
}

// ── KFactor ────────────────────────────────────────────────────────────

pub fn decode_k_factor(raw: i64) -> Result<KFactor, PersistenceError> {
    u8::try_from(raw)
        .ok()
        .and_then(|v| KFactor::try_from(v).ok())
        .ok_or_else(|| PersistenceError::Corrupt(format!("k_factor {raw}")))
}

// ── Move list ──────────────────────────────────────────────────────────

/// Moves are stored as a JSON array of notations.
pub fn encode_moves(moves: &[String]) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(moves)?)
}

pub fn decode_moves(raw: &str) -> Result<Vec<String>, PersistenceError> {
    Ok(serde_json::from_str(raw)?)
}

// ── Closing snapshot ───────────────────────────────────────────────────

pub fn encode_closing(closing: Option<&Closing>) -> Result<Option<String>, PersistenceError> {
    Ok(closing.map(serde_json::to_string).transpose()?)
}

pub fn decode_closing(raw: Option<String>) -> Result<Option<Closing>, PersistenceError> {
    Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
}

// ── Errors ─────────────────────────────────────────────────────────────

/// Map constraint violations on insert to domain errors.
pub fn map_write_error(err: sqlx::Error, what: &str) -> PersistenceError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return PersistenceError::Duplicate(what.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return PersistenceError::Missing(what.to_string());
        }
    }
    PersistenceError::Sqlx(err)
}
