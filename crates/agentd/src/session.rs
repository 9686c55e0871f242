// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns every live agent connection. Each [`Session`] is a dedicated
//! cooperative task exclusively holding the socket and the response
//! buffer, reachable only through its command channel — nothing outside
//! that task ever touches the socket, which is what makes `send`
//! serialization per session free (the task simply processes one command
//! at a time) and makes locking unnecessary.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DisconnectError, HandshakeError, SendError};
use crate::handshake;
use protocol::framer::{self, Completion, Framer, Terminator};

/// Opaque session identifier, minted by [`SessionStore::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

enum Command {
    Send { block: Bytes, respond: oneshot::Sender<Result<Bytes, SendError>> },
    Disconnect { respond: oneshot::Sender<Result<(), DisconnectError>> },
}

type Registry = Arc<Mutex<HashMap<SessionId, mpsc::Sender<Command>>>>;

/// Map of session-id to live agent connection. The only structure shared
/// across tasks in the agent transport process; its key space is
/// write-exclusive to `connect`/`disconnect`.
pub struct SessionStore {
    registry: Registry,
    rendezvous_path: PathBuf,
}

impl SessionStore {
    pub fn new(rendezvous_path: PathBuf) -> Self {
        Self { registry: Arc::new(Mutex::new(HashMap::new())), rendezvous_path }
    }

    /// Open a fresh authenticated session. Safe to call concurrently with
    /// other `connect` calls and with any in-flight `send`/`disconnect`.
    pub async fn connect(&self) -> Result<(SessionId, Bytes), HandshakeError> {
        let handshake::Handshake { stream, greeting } =
            handshake::connect(&self.rendezvous_path).await?;

        let id = SessionId::new();
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(run(id, stream, rx, Arc::clone(&self.registry)));
        self.registry.lock().await.insert(id, tx);

        debug!(session = %id, "session connected");
        Ok((id, greeting))
    }

    /// Send one opaque block to `id`'s agent and await its response. Fails
    /// with [`SendError::UnknownSession`] if the session doesn't exist (or
    /// has already torn itself down after a prior transport failure).
    pub async fn send(&self, id: SessionId, block: Bytes) -> Result<Bytes, SendError> {
        let tx = {
            let sessions = self.registry.lock().await;
            sessions.get(&id).cloned().ok_or(SendError::UnknownSession)?
        };

        let (respond_tx, respond_rx) = oneshot::channel();
        tx.send(Command::Send { block, respond: respond_tx })
            .await
            .map_err(|_| SendError::UnknownSession)?;
        respond_rx.await.map_err(|_| SendError::UnknownSession)?
    }

    /// Send `BYE`, await its response (or the agent's close, whichever
    /// comes first), then destroy the socket and remove the session
    /// regardless of outcome.
    pub async fn disconnect(&self, id: SessionId) -> Result<(), DisconnectError> {
        let tx = {
            let mut sessions = self.registry.lock().await;
            sessions.remove(&id)
        };
        let tx = tx.ok_or(DisconnectError::UnknownSession)?;

        let (respond_tx, respond_rx) = oneshot::channel();
        // The channel may already be closed if the actor tore itself down
        // after a prior fatal send error; that's still a successful
        // disconnect from the caller's point of view, since the session is
        // already gone.
        if tx.send(Command::Disconnect { respond: respond_tx }).await.is_err() {
            return Ok(());
        }
        respond_rx.await.unwrap_or(Ok(()))
    }
}

const BYE: &[u8] = b"BYE\n";

/// The per-session actor: owns the socket exclusively and processes one
/// command at a time from its channel, which is what gives `send` its
/// "at most one outstanding request per session" guarantee for free.
async fn run(id: SessionId, mut stream: TcpStream, mut rx: mpsc::Receiver<Command>, registry: Registry) {
    let mut framer = Framer::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Send { block, respond } => {
                let result = exchange(&mut stream, &mut framer, &block).await;
                let fatal = result.is_err();
                let _ = respond.send(result);
                if fatal {
                    break;
                }
            }
            Command::Disconnect { respond } => {
                let result = disconnect_exchange(&mut stream, &mut framer).await;
                let _ = respond.send(result);
                break;
            }
        }
    }

    registry.lock().await.remove(&id);
    debug!(session = %id, "session torn down");
}

/// Write `block` in one logical send, then drive the shared [`Framer`] over
/// ingress chunks until it reports a terminator.
async fn exchange(stream: &mut TcpStream, framer: &mut Framer, block: &[u8]) -> Result<Bytes, SendError> {
    framer.reset();
    stream.write_all(block).await.map_err(|_| SendError::SocketWriteFailed)?;

    let inquiry_payload = block.starts_with(b"D ");
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| SendError::SocketError(e.to_string()))?;
        if n == 0 {
            return Err(SendError::SocketClosedMidResponse);
        }
        if let Completion::Complete(_) = framer.ingest(&chunk[..n], inquiry_payload) {
            return Ok(Bytes::from(framer.take()));
        }
    }
}

async fn disconnect_exchange(stream: &mut TcpStream, framer: &mut Framer) -> Result<(), DisconnectError> {
    match exchange(stream, framer, BYE).await {
        Ok(response) => {
            if matches!(framer::completion(&response, false), Completion::Complete(Terminator::Ok)) {
                Ok(())
            } else {
                Err(DisconnectError::Failed(String::from_utf8_lossy(&response).into_owned()))
            }
        }
        // A close during the BYE round-trip is the expected shape of
        // termination, not a failure: the agent is allowed to simply hang
        // up once it sees BYE instead of echoing a final OK.
        Err(SendError::SocketClosedMidResponse) => Ok(()),
        Err(other) => {
            warn!(error = %other, "BYE exchange failed");
            Err(DisconnectError::Failed(other.to_string()))
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
