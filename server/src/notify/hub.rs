//! In-process channel hub: one unbounded channel per connection, plus rooms
//! keyed by game id.

use std::collections::HashSet;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{Event, Notifier};

/// How long a closed room keeps swallowing joins and emits. Past that the
/// finished game record is what keeps the session shut.
const CLOSED_ROOM_RETENTION: Duration = Duration::from_secs(10 * 60);

pub struct ChannelHub {
    channels: DashMap<String, mpsc::UnboundedSender<Event>>,
    rooms: DashMap<String, HashSet<String>>,
    /// Closed room -> when it was closed.
    closed: DashMap<String, Instant>,
    retention: Duration,
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::with_retention(CLOSED_ROOM_RETENTION)
    }
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            channels: DashMap::new(),
            rooms: DashMap::new(),
            closed: DashMap::new(),
            retention,
        }
    }

    /// Register a new connection and return its sid with the receiving end.
    pub fn connect(&self) -> (String, mpsc::UnboundedReceiver<Event>) {
        let sid = uuid::Uuid::new_v4().simple().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.insert(sid.clone(), tx);
        tracing::debug!(sid = %sid, "Channel connected");
        (sid, rx)
    }

    pub fn leave_room(&self, game_id: &str, sid: &str) {
        if let Some(mut members) = self.rooms.get_mut(game_id) {
            members.remove(sid);
        }
    }

    /// Drop the connection and its room memberships.
    pub fn disconnect(&self, sid: &str) {
        self.channels.remove(sid);
        for mut room in self.rooms.iter_mut() {
            room.value_mut().remove(sid);
        }
        tracing::debug!(sid, "Channel disconnected");
    }

    pub fn room_size(&self, game_id: &str) -> usize {
        self.rooms.get(game_id).map_or(0, |members| members.len())
    }

    /// Closed rooms still remembered.
    pub fn closed_rooms(&self) -> usize {
        self.closed.len()
    }

    fn is_closed(&self, game_id: &str) -> bool {
        self.closed
            .get(game_id)
            .is_some_and(|closed_at| closed_at.elapsed() < self.retention)
    }

    fn prune_closed(&self) {
        let retention = self.retention;
        self.closed
            .retain(|_, closed_at| closed_at.elapsed() < retention);
    }

    fn send(&self, sid: &str, event: &Event) {
        match self.channels.get(sid) {
            Some(tx) => {
                if tx.send(event.clone()).is_err() {
                    tracing::debug!(sid, event = event.name(), "Receiver gone, dropping event");
                }
            }
            None => tracing::debug!(sid, event = event.name(), "Unknown sid, dropping event"),
        }
    }
}

impl Notifier for ChannelHub {
    fn join_room(&self, game_id: &str, sid: &str) {
        if self.is_closed(game_id) {
            tracing::debug!(game_id, sid, "Join ignored, room closed");
            return;
        }
        self.rooms
            .entry(game_id.to_string())
            .or_default()
            .insert(sid.to_string());
    }

    fn emit_to_user(&self, sid: &str, event: &Event) {
        self.send(sid, event);
    }

    fn emit_to_room(&self, game_id: &str, event: &Event) {
        if self.is_closed(game_id) {
            return;
        }
        // Clone members out so no shard lock is held while sending.
        let members: Vec<String> = match self.rooms.get(game_id) {
            Some(members) => members.iter().cloned().collect(),
            None => return,
        };
        for sid in &members {
            self.send(sid, event);
        }
    }

    fn close_room(&self, game_id: &str) {
        self.prune_closed();
        self.closed.insert(game_id.to_string(), Instant::now());
        self.rooms.remove(game_id);
        tracing::debug!(game_id, "Room closed");
    }
}
