// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accepts local client connections on the rendezvous socket and hands each
//! one off to its own [`crate::connection`] task.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::net::UnixListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::connection::{self, ConnId};
use crate::error::ListenerError;

const SOCKET_PERMISSIONS: u32 = 0o666;

pub struct Listener {
    socket: UnixListener,
    path: PathBuf,
    agent_socket: PathBuf,
}

impl Listener {
    /// Bind the rendezvous socket, replacing any stale node left behind by
    /// a previous run, and set same-user-and-beyond access permissions.
    pub fn bind(path: &Path, agent_socket: PathBuf) -> Result<Self, ListenerError> {
        let _ = std::fs::remove_file(path);
        let socket = UnixListener::bind(path).map_err(|source| ListenerError::Bind {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_PERMISSIONS))
            .map_err(ListenerError::Permissions)?;
        Ok(Self { socket, path: path.to_path_buf(), agent_socket })
    }

    /// Accept connections until `shutdown` fires, then refuse new accepts,
    /// signal every live connection to clean up, and wait for all of them
    /// to reach a terminal state before closing the socket node.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(path = %self.path.display(), "mediator listening");
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = self.socket.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let id = ConnId::new();
                            let agent_socket = self.agent_socket.clone();
                            let conn_shutdown = shutdown.clone();
                            connections.spawn(async move {
                                connection::run(id, stream, agent_socket, conn_shutdown).await;
                            });
                        }
                        Err(err) => error!(%err, "accept failed"),
                    }
                }
            }
        }

        while connections.join_next().await.is_some() {}

        let _ = std::fs::remove_file(&self.path);
        info!(path = %self.path.display(), "mediator listener stopped");
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
