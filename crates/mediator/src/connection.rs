// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives one accepted client connection through its state machine: binds
//! an agent session, interleaves command and inquiry sub-dialogues, and
//! owns teardown of both the client socket and the bound session.

use std::fmt;
use std::path::PathBuf;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use protocol::framer::{self, Terminator};
use protocol::{extract_command, extract_inquiry_block};

use crate::client::{self, AgentTransportHandle, SessionId};
use crate::fsm::{transition, Event, State};

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Runs one client connection to completion (either DISCONNECTED or
/// FATAL), then returns. `agent_socket` is the agentd rendezvous socket
/// this connection's session will be opened against. `shutdown` fires
/// CLEANUP_REQUESTED as soon as the listener starts a graceful stop, even
/// if the client itself never closes its end.
pub async fn run(id: ConnId, mut socket: UnixStream, agent_socket: PathBuf, shutdown: CancellationToken) {
    let mut conn = Connection::new(id);

    if let Err(invalid) = conn.apply(Event::ClientSocketConnected) {
        warn!(conn = %id, "{invalid}");
        return;
    }

    match client::connect(&agent_socket).await {
        Ok(mut handle) => match handle.session_connect().await {
            Ok((session_id, greeting)) => {
                // Bind the session before checking the greeting write so
                // that cleanup() can always issue the best-effort
                // disconnect, even if the client socket fails right here.
                conn.client = Some(handle);
                conn.session_id = Some(session_id);
                if socket.write_all(&greeting).await.is_err() {
                    conn.note_error();
                    let _ = conn.apply(Event::ErrorOccurred);
                } else {
                    let _ = conn.apply(Event::AgentGreetingOk);
                }
            }
            Err(err) => {
                warn!(conn = %id, %err, "agent connect failed");
                conn.note_error();
                let _ = conn.apply(Event::ErrorOccurred);
            }
        },
        Err(err) => {
            warn!(conn = %id, %err, "agent transport unreachable");
            conn.note_error();
            let _ = conn.apply(Event::ErrorOccurred);
        }
    }

    if conn.state != State::Ready {
        conn.cleanup().await;
        return;
    }

    let mut chunk = [0u8; READ_CHUNK];
    'outer: loop {
        if conn.drain_pipelined(&mut socket).await.is_err() {
            break;
        }

        let n = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break 'outer,
            read = socket.read(&mut chunk) => match read {
                Ok(n) => n,
                Err(err) => {
                    warn!(conn = %id, %err, "client socket read error");
                    conn.note_error();
                    let _ = conn.apply(Event::ErrorOccurred);
                    break 'outer;
                }
            },
        };

        if n == 0 {
            conn.handle_socket_close();
            break 'outer;
        }

        if conn.ingest(&chunk[..n], &mut socket).await.is_err() {
            break 'outer;
        }
    }

    conn.cleanup().await;
    debug!(conn = %id, state = ?conn.state, "connection finished");
}

struct Connection {
    id: ConnId,
    state: State,
    client: Option<AgentTransportHandle>,
    session_id: Option<SessionId>,
    buffer: BytesMut,
    had_error: bool,
}

impl Connection {
    fn new(id: ConnId) -> Self {
        Self {
            id,
            state: State::Disconnected,
            client: None,
            session_id: None,
            buffer: BytesMut::new(),
            had_error: false,
        }
    }

    fn apply(&mut self, event: Event) -> Result<(), crate::error::InvalidTransition> {
        let next = transition(self.state, event)?;
        debug!(conn = %self.id, from = ?self.state, event = ?event, to = ?next, "fsm transition");
        self.state = next;
        Ok(())
    }

    fn note_error(&mut self) {
        self.had_error = true;
    }

    /// After returning to READY, a command may already sit fully buffered
    /// (pipelined ahead of the response it followed). Drain and process it
    /// without waiting for fresh ingress.
    async fn drain_pipelined(&mut self, socket: &mut UnixStream) -> Result<(), ()> {
        while self.state == State::Ready && !self.buffer.is_empty() {
            let Some(block) = extract_command(&mut self.buffer) else {
                // Incomplete command sitting in the buffer; wait for more
                // bytes from the socket before re-checking.
                return Ok(());
            };
            if self.apply(Event::ClientDataStart).is_err() {
                self.note_error();
                let _ = self.apply(Event::ErrorOccurred);
                return Err(());
            }
            if self.apply(Event::ClientDataComplete).is_err() {
                self.note_error();
                let _ = self.apply(Event::ErrorOccurred);
                return Err(());
            }
            self.round_trip(block, socket).await?;
        }
        Ok(())
    }

    /// Append `chunk` to the buffer, drive the chunk-dispatcher event, then
    /// attempt extraction and — if a full unit is present — the agent
    /// round-trip.
    async fn ingest(&mut self, chunk: &[u8], socket: &mut UnixStream) -> Result<(), ()> {
        let event = match self.state {
            State::Ready => Event::ClientDataStart,
            State::BufferingCommand | State::BufferingInquire => Event::ClientDataPartial,
            _ => {
                warn!(conn = %self.id, state = ?self.state, "client data in non-accepting state");
                self.note_error();
                let _ = self.apply(Event::ErrorOccurred);
                return Err(());
            }
        };
        if self.apply(event).is_err() {
            self.note_error();
            let _ = self.apply(Event::ErrorOccurred);
            return Err(());
        }

        self.buffer.extend_from_slice(chunk);

        let extracted = match self.state {
            State::BufferingCommand => extract_command(&mut self.buffer),
            State::BufferingInquire => extract_inquiry_block(&mut self.buffer),
            _ => None,
        };

        let Some(block) = extracted else { return Ok(()) };

        if self.apply(Event::ClientDataComplete).is_err() {
            self.note_error();
            let _ = self.apply(Event::ErrorOccurred);
            return Err(());
        }

        self.round_trip(block, socket).await
    }

    /// Send one extracted block to the bound agent session and forward the
    /// response to the client, classifying it to decide the next state.
    async fn round_trip(&mut self, block: Bytes, socket: &mut UnixStream) -> Result<(), ()> {
        if self.apply(Event::WriteOk).is_err() {
            self.note_error();
            let _ = self.apply(Event::ErrorOccurred);
            return Err(());
        }

        let Some(session_id) = self.session_id.clone() else {
            self.note_error();
            let _ = self.apply(Event::ErrorOccurred);
            return Err(());
        };
        let Some(client) = self.client.as_mut() else {
            self.note_error();
            let _ = self.apply(Event::ErrorOccurred);
            return Err(());
        };

        let response = match client.session_send(&session_id, block).await {
            Ok(response) => response,
            Err(err) => {
                warn!(conn = %self.id, %err, "agent send failed");
                self.note_error();
                let _ = self.apply(Event::ErrorOccurred);
                return Err(());
            }
        };

        if self.apply(Event::AgentResponseComplete).is_err() {
            self.note_error();
            let _ = self.apply(Event::ErrorOccurred);
            return Err(());
        }

        if socket.write_all(&response).await.is_err() {
            self.note_error();
            let _ = self.apply(Event::ErrorOccurred);
            return Err(());
        }

        let event = match framer::completion(&response, false) {
            framer::Completion::Complete(Terminator::Inquire) => Event::ResponseInquire,
            _ => Event::ResponseOkOrErr,
        };
        if self.apply(event).is_err() {
            self.note_error();
            let _ = self.apply(Event::ErrorOccurred);
            return Err(());
        }

        Ok(())
    }

    /// The client socket's close event may arrive in any socket-having
    /// state. Ignored once already tearing down; otherwise routed through
    /// ERROR when a prior error is pending, or straight to CLEANUP_REQUESTED
    /// for a clean hangup.
    fn handle_socket_close(&mut self) {
        if matches!(self.state, State::Error | State::Closing | State::Fatal | State::Disconnected)
        {
            return;
        }
        if self.had_error {
            let _ = self.apply(Event::ErrorOccurred);
        }
        // CLEANUP_REQUESTED is applied uniformly by `cleanup()`.
    }

    async fn cleanup(&mut self) {
        if matches!(self.state, State::Closing | State::Fatal | State::Disconnected) {
            return;
        }
        if self.apply(Event::CleanupRequested).is_err() {
            return;
        }

        let mut ok = true;

        if let (Some(client), Some(session_id)) = (self.client.as_mut(), self.session_id.take()) {
            if let Err(err) = client.session_disconnect(&session_id).await {
                warn!(conn = %self.id, %err, "best-effort session disconnect failed");
                ok = false;
            }
        }

        self.buffer.clear();
        self.client = None;

        let outcome = if ok { Event::CleanupComplete } else { Event::CleanupError };
        if self.apply(outcome).is_err() {
            return;
        }
        if self.state == State::Fatal {
            info!(conn = %self.id, "connection cleanup failed, discarding in FATAL");
        }
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
