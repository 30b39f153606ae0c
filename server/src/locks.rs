//! Keyed lease locks.
//!
//! A lease grants exclusive use of a key (`game:<id>` or `user:<id>`) until it
//! is released or expires. Expired leases can be taken over by the next
//! waiter, so a worker that stalls mid-transition cannot block a key forever.
//! Holders call [`LeaseGuard::ensure_held`] before persisting to detect a
//! takeover.
//!
//! Lock order is always game before user.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LockError {
    #[error("timed out waiting for lock {key}")]
    Timeout { key: String },
    #[error("lease on {key} expired before the transition completed")]
    LeaseLost { key: String },
}

struct Lease {
    token: u64,
    expires_at: Instant,
}

#[derive(Default)]
struct LockTable {
    leases: Mutex<HashMap<String, Lease>>,
    released: Notify,
    next_token: AtomicU64,
}

/// Lease lock service shared by all workers of one process.
#[derive(Clone)]
pub struct LeaseLocks {
    table: Arc<LockTable>,
    lease: Duration,
    wait: Duration,
}

/// Exclusive hold on one key. Dropping the guard releases the lease if it is
/// still ours.
pub struct LeaseGuard {
    table: Arc<LockTable>,
    key: String,
    token: u64,
}

impl fmt::Debug for LeaseGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseGuard")
            .field("key", &self.key)
            .field("token", &self.token)
            .finish()
    }
}

impl LeaseLocks {
    /// `lease` bounds how long a holder keeps a key; `wait` bounds how long
    /// [`acquire`](Self::acquire) blocks.
    pub fn new(lease: Duration, wait: Duration) -> Self {
        Self {
            table: Arc::new(LockTable::default()),
            lease,
            wait,
        }
    }

    pub async fn acquire_game(&self, game_id: &str) -> Result<LeaseGuard, LockError> {
        self.acquire(&format!("game:{game_id}")).await
    }

    pub async fn acquire_user(&self, user_id: &str) -> Result<LeaseGuard, LockError> {
        self.acquire(&format!("user:{user_id}")).await
    }

    pub async fn acquire(&self, key: &str) -> Result<LeaseGuard, LockError> {
        let deadline = Instant::now() + self.wait;

        loop {
            // Register interest before inspecting the table so a release
            // between the check and the wait is not missed.
            let released = self.table.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let busy_until = {
                let mut leases = self.table.leases.lock();
                let now = Instant::now();
                match leases.get(key).map(|lease| lease.expires_at) {
                    Some(expires_at) if expires_at > now => expires_at,
                    stale => {
                        if stale.is_some() {
                            tracing::warn!(key, "Taking over expired lease");
                        }
                        let token = self.table.next_token.fetch_add(1, Ordering::Relaxed);
                        leases.insert(
                            key.to_string(),
                            Lease {
                                token,
                                expires_at: now + self.lease,
                            },
                        );
                        return Ok(LeaseGuard {
                            table: self.table.clone(),
                            key: key.to_string(),
                            token,
                        });
                    }
                }
            };

            if Instant::now() >= deadline {
                tracing::debug!(key, "Lock wait timed out");
                return Err(LockError::Timeout {
                    key: key.to_string(),
                });
            }

            tokio::select! {
                _ = &mut released => {}
                _ = tokio::time::sleep_until(busy_until.min(deadline)) => {}
            }
        }
    }
}

impl LeaseGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fails if the lease expired and may have been taken over.
    pub fn ensure_held(&self) -> Result<(), LockError> {
        let leases = self.table.leases.lock();
        match leases.get(&self.key) {
            Some(lease) if lease.token == self.token && lease.expires_at > Instant::now() => Ok(()),
            _ => Err(LockError::LeaseLost {
                key: self.key.clone(),
            }),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let mut leases = self.table.leases.lock();
        if leases.get(&self.key).is_some_and(|l| l.token == self.token) {
            leases.remove(&self.key);
        }
        drop(leases);
        self.table.released.notify_waiters();
    }
}
