use chess::Side;

use super::{Orchestrator, TaskError};
use crate::dispatch::SessionTask;
use crate::model::{Closing, GameResult};
use crate::notify::Event;
use crate::persistence::{now_timestamp, SessionStore, SettlementToken, UserChange};

impl<S: SessionStore> Orchestrator<S> {
    /// Close a session: notify, close the room, count the game for both
    /// players, enqueue rating settlement and persist the result last.
    ///
    /// The first attempt records a [`Closing`] snapshot before anything is
    /// enqueued. Retries replay that snapshot, so a later `result` or a
    /// rating already moved by settlement never changes what is applied.
    pub async fn finalize(
        &self,
        game_id: &str,
        result: GameResult,
        reason: &str,
        settle_ratings: bool,
    ) -> Result<(), TaskError> {
        let lease = self.locks.acquire_game(game_id).await?;
        let mut game = self.require_game(game_id).await?;
        if game.is_finished {
            tracing::debug!(game_id, "Session already finalized");
            return Ok(());
        }

        let white = self.require_user(&game.white_player_id).await?;
        let black = self.require_user(&game.black_player_id).await?;
        let players = [(Side::White, &white), (Side::Black, &black)];

        let closing = match game.closing.clone() {
            Some(closing) => {
                tracing::info!(game_id, result = %closing.result, "Resuming interrupted finalize");
                closing
            }
            None => {
                let closing = Closing {
                    result,
                    reason: reason.to_string(),
                    deltas: settle_ratings.then(|| {
                        rating::deltas_for_game(
                            white.rating,
                            white.k_factor,
                            black.rating,
                            black.k_factor,
                        )
                    }),
                };
                for (side, user) in players {
                    if let Some(sid) = user.sid.as_deref() {
                        self.notifier.emit_to_user(
                            sid,
                            &Event::SessionEnded {
                                outcome_label: closing.result.label_for(side),
                                reason: closing.reason.clone(),
                            },
                        );
                    }
                }
                self.notifier.close_room(game_id);

                game.closing = Some(closing.clone());
                lease.ensure_held()?;
                self.store.save_game(&game).await?;
                closing
            }
        };

        for (_, user) in players {
            let user_lease = self.locks.acquire_user(&user.id).await?;
            user_lease.ensure_held()?;
            let counted = self
                .store
                .settle_once(
                    &SettlementToken::games_played(game_id, &user.id),
                    &UserChange::FinishGame {
                        game_id: game_id.to_string(),
                    },
                )
                .await?;
            if !counted {
                tracing::debug!(game_id, user_id = %user.id, "Game already counted");
            }
        }

        if let Some(deltas) = closing.deltas {
            for (side, user) in players {
                let table = match side {
                    Side::White => deltas.white,
                    Side::Black => deltas.black,
                };
                if let Some(score) = closing.result.score_for(side) {
                    self.queue.submit(SessionTask::SettleRating {
                        game_id: game_id.to_string(),
                        user_id: user.id.clone(),
                        delta: table.for_score(score),
                    })?;
                }
                self.queue.submit_delayed(
                    SessionTask::RecomputeKFactor {
                        user_id: user.id.clone(),
                    },
                    self.k_factor_delay,
                )?;
            }
        }

        game.is_finished = true;
        game.result = Some(closing.result);
        game.reason = closing.reason.clone();
        game.finished_at = Some(now_timestamp());
        lease.ensure_held()?;
        self.store.save_game(&game).await?;

        tracing::info!(
            game_id,
            result = %closing.result,
            reason = %closing.reason,
            rated = closing.deltas.is_some(),
            "Session finalized"
        );
        Ok(())
    }
}
