//! SQLite-backed settlement ledger.

use super::helpers::map_write_error;
use super::SqliteStore;
use crate::persistence::traits::SettlementLedger;
use crate::persistence::{now_timestamp, PersistenceError, SettlementToken, UserChange};

impl SettlementLedger for SqliteStore {
    async fn settle_once(
        &self,
        token: &SettlementToken,
        change: &UserChange,
    ) -> Result<bool, PersistenceError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO settlements (game_id, user_id, kind, applied_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&token.game_id)
        .bind(&token.user_id)
        .bind(token.kind.as_str())
        .bind(now_timestamp() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &format!("user {}", token.user_id)))?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let updated = match change {
            UserChange::RatingDelta(delta) => {
                sqlx::query("UPDATE users SET rating = rating + ? WHERE id = ?")
                    .bind(*delta)
                    .bind(&token.user_id)
                    .execute(&mut *tx)
                    .await?
            }
            UserChange::FinishGame { game_id } => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET games_played = games_played + 1,
                        cur_game_id = CASE WHEN cur_game_id = ? THEN NULL ELSE cur_game_id END
                    WHERE id = ?
                    "#,
                )
                .bind(game_id)
                .bind(&token.user_id)
                .execute(&mut *tx)
                .await?
            }
        }
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Err(PersistenceError::Missing(format!("user {}", token.user_id)));
        }

        tx.commit().await?;
        Ok(true)
    }
}
