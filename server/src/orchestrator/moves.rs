use chess::MoveVerdict;

use super::{corrupt_board, finalize_task, Orchestrator, TaskError};
use crate::dispatch::SessionTask;
use crate::model::GameResult;
use crate::notify::Event;
use crate::persistence::SessionStore;

impl<S: SessionStore> Orchestrator<S> {
    /// Validate and apply one move. Every rejection is silent.
    pub async fn apply_move(
        &self,
        game_id: &str,
        user_id: &str,
        notation: &str,
    ) -> Result<(), TaskError> {
        let lease = self.locks.acquire_game(game_id).await?;
        let mut game = self.require_game(game_id).await?;

        if let (Some(closing), false) = (&game.closing, game.is_finished) {
            tracing::info!(game_id, "Finalize incomplete, resubmitting");
            self.queue.submit(SessionTask::FinalizeSession {
                game_id: game_id.to_string(),
                result: closing.result,
                reason: closing.reason.clone(),
                settle_ratings: closing.deltas.is_some(),
            })?;
            return Ok(());
        }
        if !game.in_play() {
            tracing::debug!(game_id, user_id, "Move ignored, session not in play");
            return Ok(());
        }
        let Some(side) = game.side_of(user_id) else {
            tracing::debug!(game_id, user_id, "Move ignored, user is not a player");
            return Ok(());
        };

        // A terminal but unfinished game means the finalize task was lost
        // after the last move was saved.
        if let Some(terminal) =
            chess::terminal_result(&game.board_state).map_err(corrupt_board(game_id))?
        {
            tracing::info!(game_id, reason = %terminal.reason, "Position already terminal, resubmitting finalize");
            self.queue.submit(finalize_task(game_id, terminal))?;
            return Ok(());
        }

        let turn = chess::turn_owner(&game.board_state).map_err(corrupt_board(game_id))?;
        if turn != side {
            tracing::debug!(game_id, user_id, %side, "Move ignored, not this side's turn");
            return Ok(());
        }

        let applied = match chess::apply_move(&game.board_state, notation)
            .map_err(corrupt_board(game_id))?
        {
            MoveVerdict::Legal(applied) => applied,
            MoveVerdict::Illegal(e) => {
                tracing::info!(game_id, user_id, notation, "Illegal move rejected: {}", e);
                return Ok(());
            }
        };

        let notation = notation.trim().to_string();
        game.board_state = applied.board_state;
        game.moves.push(notation.clone());
        lease.ensure_held()?;
        self.store.save_game(&game).await?;

        tracing::debug!(game_id, user_id, notation = %notation, ply = game.moves.len(), "Move applied");
        self.notifier.emit_to_room(
            game_id,
            &Event::SessionMoveApplied {
                move_notation: notation,
            },
        );

        if let Some(terminal) = applied.terminal {
            tracing::info!(game_id, outcome = ?terminal.outcome, reason = %terminal.reason, "Game over on the board");
            self.queue.submit(finalize_task(game_id, terminal))?;
        }
        Ok(())
    }

    /// A player concedes; the opponent wins.
    pub async fn resign(&self, game_id: &str, user_id: &str) -> Result<(), TaskError> {
        let _lease = self.locks.acquire_game(game_id).await?;
        let game = self.require_game(game_id).await?;

        if !game.in_play() {
            tracing::debug!(game_id, user_id, "Resignation ignored, session not in play");
            return Ok(());
        }
        let Some(side) = game.side_of(user_id) else {
            tracing::debug!(game_id, user_id, "Resignation ignored, user is not a player");
            return Ok(());
        };

        tracing::info!(game_id, user_id, %side, "Player resigned");
        self.queue.submit(SessionTask::FinalizeSession {
            game_id: game_id.to_string(),
            result: GameResult::win_for(side.opponent()),
            reason: "resignation".to_string(),
            settle_ratings: true,
        })?;
        Ok(())
    }
}
