//! Arbiter: orchestrates rated two-player chess sessions.
//!
//! The [`orchestrator`] owns the session state machine. It is driven by
//! [`dispatch`] workers, persists through [`persistence`], serializes access
//! with [`locks`] and talks to players through [`notify`]. The [`gateway`]
//! exposes all of it over a line-based TCP protocol.

pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod locks;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod persistence;

#[cfg(test)]
mod test_support;
