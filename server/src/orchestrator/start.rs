use chess::{Side, STARTING_FEN};

use super::{session_state, Orchestrator, TaskError};
use crate::notify::Event;
use crate::persistence::SessionStore;

impl<S: SessionStore> Orchestrator<S> {
    /// Move a pending game to started, put both bound channels in the room
    /// and greet each player.
    pub async fn start(&self, game_id: &str) -> Result<(), TaskError> {
        let lease = self.locks.acquire_game(game_id).await?;
        let mut game = self.require_game(game_id).await?;
        if game.is_started {
            tracing::debug!(game_id, "Session already started");
            return Ok(());
        }

        // Both players must exist before either is touched.
        self.require_user(&game.white_player_id).await?;
        self.require_user(&game.black_player_id).await?;

        let white = self
            .update_user(&game.white_player_id, |user| {
                user.cur_game_id = Some(game_id.to_string());
                true
            })
            .await?;
        let black = self
            .update_user(&game.black_player_id, |user| {
                user.cur_game_id = Some(game_id.to_string());
                true
            })
            .await?;

        game.board_state = STARTING_FEN.to_string();
        game.moves.clear();
        game.is_started = true;
        lease.ensure_held()?;
        self.store.save_game(&game).await?;

        tracing::info!(
            game_id,
            white = %white.login,
            black = %black.login,
            "Session started"
        );

        for (side, me, opponent) in [(Side::White, &white, &black), (Side::Black, &black, &white)] {
            let Some(sid) = me.sid.as_deref() else {
                tracing::debug!(game_id, user_id = %me.id, "No channel bound, skipping greeting");
                continue;
            };
            self.notifier.join_room(game_id, sid);
            let state = session_state(&game.board_state, side, me, opponent);
            self.notifier
                .emit_to_user(sid, &Event::SessionStarted(state));
        }
        Ok(())
    }
}
