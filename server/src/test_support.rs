//! Recording fakes for the notifier and the task queue.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::dispatch::{DispatchError, SessionTask, TaskQueue};
use crate::notify::{Event, Notifier};

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    User { sid: String, event: Event },
    Room { game_id: String, event: Event },
}

/// Records every delivery and honours room closure like the real hub.
#[derive(Default)]
pub struct RecordingNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    joins: Mutex<Vec<(String, String)>>,
    closed: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    /// Sids that joined `game_id`, in order.
    pub fn members(&self, game_id: &str) -> Vec<String> {
        self.joins
            .lock()
            .iter()
            .filter(|(g, _)| g == game_id)
            .map(|(_, sid)| sid.clone())
            .collect()
    }

    pub fn to_user(&self, sid: &str) -> Vec<Event> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::User { sid: s, event } if s == sid => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn to_room(&self, game_id: &str) -> Vec<Event> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Room { game_id: g, event } if g == game_id => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self, game_id: &str) -> bool {
        self.closed.lock().contains(game_id)
    }

    pub fn clear(&self) {
        self.deliveries.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn join_room(&self, game_id: &str, sid: &str) {
        if self.is_closed(game_id) {
            return;
        }
        self.joins
            .lock()
            .push((game_id.to_string(), sid.to_string()));
    }

    fn emit_to_user(&self, sid: &str, event: &Event) {
        self.deliveries.lock().push(Delivery::User {
            sid: sid.to_string(),
            event: event.clone(),
        });
    }

    fn emit_to_room(&self, game_id: &str, event: &Event) {
        if self.is_closed(game_id) {
            return;
        }
        self.deliveries.lock().push(Delivery::Room {
            game_id: game_id.to_string(),
            event: event.clone(),
        });
    }

    fn close_room(&self, game_id: &str) {
        self.closed.lock().insert(game_id.to_string());
    }
}

/// Collects submitted tasks instead of running them.
#[derive(Default)]
pub struct RecordingQueue {
    tasks: Mutex<Vec<(SessionTask, Option<Duration>)>>,
    fail_next_delayed: AtomicBool,
}

impl RecordingQueue {
    /// Reject the next delayed submission as if the queue were down.
    pub fn fail_next_delayed(&self) {
        self.fail_next_delayed.store(true, Ordering::SeqCst);
    }

    /// Remove and return everything submitted so far.
    pub fn take(&self) -> Vec<(SessionTask, Option<Duration>)> {
        std::mem::take(&mut *self.tasks.lock())
    }

    pub fn peek(&self) -> Vec<SessionTask> {
        self.tasks.lock().iter().map(|(task, _)| task.clone()).collect()
    }
}

impl TaskQueue for RecordingQueue {
    fn submit(&self, task: SessionTask) -> Result<(), DispatchError> {
        self.tasks.lock().push((task, None));
        Ok(())
    }

    fn submit_delayed(&self, task: SessionTask, delay: Duration) -> Result<(), DispatchError> {
        if self.fail_next_delayed.swap(false, Ordering::SeqCst) {
            return Err(DispatchError::Closed);
        }
        self.tasks.lock().push((task, Some(delay)));
        Ok(())
    }
}
