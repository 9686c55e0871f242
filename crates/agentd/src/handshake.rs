// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opens and authenticates a loopback connection to the key agent, following
//! its cookie rendezvous scheme. The agent closes the socket silently on
//! cookie mismatch — no `ERR` line is ever sent for a bad cookie — so a
//! closed-before-greeting socket and a rejected greeting are distinguished
//! as separate failure kinds.

use std::path::Path;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use crate::error::HandshakeError;

/// Overall budget for connect + cookie write + greeting read.
const HANDSHAKE_BUDGET: Duration = Duration::from_secs(5);

/// Chunk size used while waiting for the greeting's terminating newline.
const READ_CHUNK: usize = 256;

pub struct Handshake {
    pub stream: TcpStream,
    pub greeting: Bytes,
}

/// Run the full handshake against the rendezvous file at `path`.
pub async fn connect(path: &Path) -> Result<Handshake, HandshakeError> {
    let data = tokio::fs::read(path).await.map_err(|_| HandshakeError::RendezvousMissing)?;
    let descriptor =
        protocol::parse_rendezvous(&data).map_err(|_| HandshakeError::RendezvousMalformed)?;

    let deadline = Instant::now() + HANDSHAKE_BUDGET;

    let mut stream = timeout(
        remaining(deadline),
        TcpStream::connect(("127.0.0.1", descriptor.port)),
    )
    .await
    .map_err(|_| HandshakeError::ConnectTimeout)?
    .map_err(|_| HandshakeError::ConnectTimeout)?;

    timeout(remaining(deadline), stream.write_all(&descriptor.cookie))
        .await
        .map_err(|_| HandshakeError::ConnectTimeout)?
        .map_err(|_| HandshakeError::AuthWriteFailed)?;

    let greeting = timeout(remaining(deadline), read_greeting(&mut stream))
        .await
        .map_err(|_| HandshakeError::ConnectTimeout)??;

    Ok(Handshake { stream, greeting })
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Read bytes until the first `\n`-terminated line arrives. The line must
/// begin with `OK`; an agent-initiated close before any newline arrives is
/// reported as [`HandshakeError::GreetingAborted`], a non-`OK` line as
/// [`HandshakeError::GreetingRejected`].
async fn read_greeting(stream: &mut TcpStream) -> Result<Bytes, HandshakeError> {
    let mut buf = BytesMut::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line = buf.split_to(pos).freeze();
            return if line.starts_with(b"OK") {
                Ok(line)
            } else {
                Err(HandshakeError::GreetingRejected(String::from_utf8_lossy(&line).into_owned()))
            };
        }

        let n = stream.read(&mut chunk).await.map_err(|_| HandshakeError::GreetingAborted)?;
        if n == 0 {
            return Err(HandshakeError::GreetingAborted);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
#[path = "handshake_tests.rs"]
mod tests;
