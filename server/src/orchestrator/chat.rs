use super::{Orchestrator, TaskError};
use crate::notify::Event;
use crate::persistence::SessionStore;

/// Longest chat line relayed, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

impl<S: SessionStore> Orchestrator<S> {
    /// Relay a chat line to the game room.
    pub async fn send_message(
        &self,
        game_id: &str,
        sender: &str,
        message: &str,
    ) -> Result<(), TaskError> {
        let game = self.require_game(game_id).await?;
        if game.has_ended() {
            tracing::debug!(game_id, sender, "Chat dropped, session over");
            return Ok(());
        }

        let message = message.trim();
        if message.is_empty() {
            tracing::debug!(game_id, sender, "Empty chat message dropped");
            return Ok(());
        }
        let message: String = message.chars().take(MAX_MESSAGE_CHARS).collect();

        self.notifier.emit_to_room(
            game_id,
            &Event::ChatMessage {
                sender: sender.to_string(),
                message,
            },
        );
        Ok(())
    }
}
