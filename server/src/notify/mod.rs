//! Outbound events and the delivery boundary.

mod hub;

pub use hub::ChannelHub;

use chess::Side;
use rating::RatingPreview;
use serde::{Deserialize, Serialize};

use crate::model::OutcomeLabel;

/// Everything a player needs to render a session from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub board_state: String,
    pub color: Side,
    pub opponent_login: String,
    /// Whole points, truncated.
    pub opponent_rating: i64,
    pub rating_preview: RatingPreview,
}

/// Event pushed to clients, serialized as `{"event": ..., "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum Event {
    SessionStarted(SessionState),
    SessionResumed(SessionState),
    SessionMoveApplied {
        move_notation: String,
    },
    SessionEnded {
        outcome_label: OutcomeLabel,
        reason: String,
    },
    ChatMessage {
        sender: String,
        message: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStarted(_) => "session_started",
            Self::SessionResumed(_) => "session_resumed",
            Self::SessionMoveApplied { .. } => "session_move_applied",
            Self::SessionEnded { .. } => "session_ended",
            Self::ChatMessage { .. } => "chat_message",
        }
    }
}

/// Best-effort delivery. Implementations absorb stale addresses silently.
pub trait Notifier: Send + Sync {
    /// Add `sid` to the game's room. Joining a closed room is ignored.
    fn join_room(&self, game_id: &str, sid: &str);
    fn emit_to_user(&self, sid: &str, event: &Event);
    fn emit_to_room(&self, game_id: &str, event: &Event);
    /// After this call every emit to the room is a no-op. The game record
    /// keeps the closure permanent; implementations may forget it later.
    fn close_room(&self, game_id: &str);
}
