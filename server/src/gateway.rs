//! Line-delimited JSON gateway over TCP.
//!
//! Each connection gets a channel from the [`ChannelHub`]; outbound events are
//! written one JSON object per line. Inbound lines are [`Command`]s that either
//! bind the connection to a user or turn into [`SessionTask`]s.

use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::dispatch::{DispatchError, SessionTask, TaskQueue};
use crate::notify::{ChannelHub, Notifier};
use crate::orchestrator::{Orchestrator, TaskError};
use crate::persistence::{GameRepository, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("send hello before {0}")]
    NotIdentified(&'static str),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Client command, e.g. `{"cmd": "move", "game_id": "g1", "san": "e4"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Hello { user_id: String },
    Start { game_id: String },
    Join { game_id: String },
    Move { game_id: String, san: String },
    Resign { game_id: String },
    Chat { game_id: String, message: String },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Start { .. } => "start",
            Self::Join { .. } => "join",
            Self::Move { .. } => "move",
            Self::Resign { .. } => "resign",
            Self::Chat { .. } => "chat",
        }
    }
}

/// Per-connection state.
#[derive(Debug)]
pub struct Connection {
    pub sid: String,
    identity: Option<Identity>,
}

#[derive(Debug)]
struct Identity {
    user_id: String,
    login: String,
}

impl Connection {
    pub fn new(sid: String) -> Self {
        Self {
            sid,
            identity: None,
        }
    }

    fn identity(&self, command: &'static str) -> Result<&Identity, GatewayError> {
        self.identity
            .as_ref()
            .ok_or(GatewayError::NotIdentified(command))
    }
}

pub struct Gateway<S: SessionStore> {
    orchestrator: Arc<Orchestrator<S>>,
    hub: Arc<ChannelHub>,
    queue: Arc<dyn TaskQueue>,
}

impl<S: SessionStore> Gateway<S> {
    pub fn new(
        orchestrator: Arc<Orchestrator<S>>,
        hub: Arc<ChannelHub>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            orchestrator,
            hub,
            queue,
        }
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), GatewayError> {
        tracing::info!(addr = %listener.local_addr()?, "Gateway listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            let gateway = self.clone();
            tokio::spawn(async move {
                if let Err(e) = gateway.handle_connection(stream).await {
                    tracing::warn!(%peer, "Connection ended with error: {}", e);
                }
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream) -> Result<(), GatewayError> {
        let (read_half, mut write_half) = stream.into_split();
        let (sid, events) = self.hub.connect();
        tracing::info!(sid = %sid, "Client connected");

        let writer_sid = sid.clone();
        let mut events = UnboundedReceiverStream::new(events);
        let writer = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let mut line = match serde_json::to_string(&event) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(sid = %writer_sid, "Failed to encode event: {}", e);
                        continue;
                    }
                };
                line.push('\n');
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        let mut connection = Connection::new(sid.clone());
        let mut lines = BufReader::new(read_half).lines();
        let result = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e.into()),
            };
            if line.trim().is_empty() {
                continue;
            }
            if let Err(e) = self.handle_line(&mut connection, &line).await {
                tracing::warn!(sid = %sid, "Command rejected: {}", e);
            }
        };

        self.hub.disconnect(&sid);
        writer.abort();
        tracing::info!(sid = %sid, "Client disconnected");
        result
    }

    pub async fn handle_line(
        &self,
        connection: &mut Connection,
        line: &str,
    ) -> Result<(), GatewayError> {
        let command: Command = serde_json::from_str(line)?;
        self.handle_command(connection, command).await
    }

    /// Rooms of ended games stay shut even once the hub has forgotten them.
    async fn join_if_open(&self, game_id: &str, sid: &str) -> Result<(), GatewayError> {
        let game = self
            .orchestrator
            .store()
            .load_game(game_id)
            .await
            .map_err(TaskError::from)?;
        if game.as_ref().is_some_and(|game| game.has_ended()) {
            tracing::debug!(game_id, sid, "Join refused, session over");
            return Ok(());
        }
        self.hub.join_room(game_id, sid);
        Ok(())
    }

    pub async fn handle_command(
        &self,
        connection: &mut Connection,
        command: Command,
    ) -> Result<(), GatewayError> {
        tracing::debug!(sid = %connection.sid, cmd = command.name(), "Command received");
        match command {
            Command::Hello { user_id } => {
                let binding = self
                    .orchestrator
                    .bind_channel(&user_id, &connection.sid)
                    .await?;
                if let Some(game_id) = binding.cur_game_id {
                    self.join_if_open(&game_id, &connection.sid).await?;
                    self.queue.submit(SessionTask::ReconnectSession {
                        game_id,
                        user_id: user_id.clone(),
                    })?;
                }
                connection.identity = Some(Identity {
                    user_id,
                    login: binding.login,
                });
            }
            Command::Start { game_id } => {
                self.join_if_open(&game_id, &connection.sid).await?;
                self.queue.submit(SessionTask::StartSession { game_id })?;
            }
            Command::Join { game_id } => {
                self.join_if_open(&game_id, &connection.sid).await?;
            }
            Command::Move { game_id, san } => {
                let identity = connection.identity("move")?;
                self.queue.submit(SessionTask::ApplySessionMove {
                    game_id,
                    user_id: identity.user_id.clone(),
                    move_notation: san,
                })?;
            }
            Command::Resign { game_id } => {
                let identity = connection.identity("resign")?;
                self.queue.submit(SessionTask::ResignSession {
                    game_id,
                    user_id: identity.user_id.clone(),
                })?;
            }
            Command::Chat { game_id, message } => {
                let identity = connection.identity("chat")?;
                self.queue.submit(SessionTask::SendMessage {
                    game_id,
                    sender: identity.login.clone(),
                    message,
                })?;
            }
        }
        Ok(())
    }
}
