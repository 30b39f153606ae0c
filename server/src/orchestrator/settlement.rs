use rating::next_k_factor;

use super::{Orchestrator, TaskError};
use crate::persistence::{SessionStore, SettlementToken, UserChange};

impl<S: SessionStore> Orchestrator<S> {
    /// Apply one player's rating delta for a game, at most once.
    pub async fn settle_rating(
        &self,
        game_id: &str,
        user_id: &str,
        delta: f64,
    ) -> Result<(), TaskError> {
        let lease = self.locks.acquire_user(user_id).await?;
        self.require_user(user_id).await?;
        lease.ensure_held()?;

        let applied = self
            .store
            .settle_once(
                &SettlementToken::rating(game_id, user_id),
                &UserChange::RatingDelta(delta),
            )
            .await?;
        if applied {
            tracing::info!(game_id, user_id, delta, "Rating settled");
        } else {
            tracing::debug!(game_id, user_id, "Rating already settled");
        }
        Ok(())
    }

    pub async fn recompute_k_factor(&self, user_id: &str) -> Result<(), TaskError> {
        self.update_user(user_id, |user| {
            let next = next_k_factor(user.k_factor, user.games_played, user.rating);
            if next == user.k_factor {
                return false;
            }
            tracing::info!(user_id = %user.id, from = %user.k_factor, to = %next, "K-factor lowered");
            user.k_factor = next;
            true
        })
        .await?;
        Ok(())
    }
}
