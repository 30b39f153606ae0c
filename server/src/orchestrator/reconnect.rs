use super::{session_state, Orchestrator, TaskError};
use crate::notify::Event;
use crate::persistence::SessionStore;

/// What the gateway needs after a channel is bound to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBinding {
    pub login: String,
    pub cur_game_id: Option<String>,
}

impl<S: SessionStore> Orchestrator<S> {
    /// Resend the session snapshot to a returning player. Reads only.
    pub async fn reconnect(&self, game_id: &str, user_id: &str) -> Result<(), TaskError> {
        let game = self.require_game(game_id).await?;
        if !game.in_play() {
            tracing::debug!(game_id, user_id, "Reconnect ignored, session not in play");
            return Ok(());
        }
        let Some(side) = game.side_of(user_id) else {
            tracing::debug!(game_id, user_id, "Reconnect ignored, user is not a player");
            return Ok(());
        };

        let me = self.require_user(user_id).await?;
        let opponent = self.require_user(game.player_id(side.opponent())).await?;
        let Some(sid) = me.sid.as_deref() else {
            tracing::debug!(game_id, user_id, "Reconnect ignored, no channel bound");
            return Ok(());
        };

        let state = session_state(&game.board_state, side, &me, &opponent);
        self.notifier
            .emit_to_user(sid, &Event::SessionResumed(state));
        tracing::debug!(game_id, user_id, "Session resumed");
        Ok(())
    }

    /// Record `sid` as the user's live channel.
    pub async fn bind_channel(&self, user_id: &str, sid: &str) -> Result<ChannelBinding, TaskError> {
        let user = self
            .update_user(user_id, |user| {
                user.sid = Some(sid.to_string());
                true
            })
            .await?;
        tracing::info!(user_id, sid, "Channel bound");
        Ok(ChannelBinding {
            login: user.login,
            cur_game_id: user.cur_game_id,
        })
    }
}
