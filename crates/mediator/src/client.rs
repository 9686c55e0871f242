// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin wrapper around the generated `AgentTransport` gRPC client, dialing
//! the agent transport process over its Unix-domain socket instead of TCP.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use hyper_util::rt::TokioIo;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use agentd::proto::agent_transport_client::AgentTransportClient;
use agentd::proto::{ConnectRequest, DisconnectRequest, SendRequest};

/// Matches [`crate::session`]'s `SessionId`: an opaque string handed back
/// and forth across the inter-context boundary, never interpreted by CM.
pub type SessionId = String;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to agent transport: {0}")]
    Connect(#[from] tonic::transport::Error),
    #[error("agent transport call failed: {0}")]
    Rpc(#[from] tonic::Status),
}

/// Client-side handle to the agent transport, bound to one rendezvous
/// socket path. Cheap to clone (wraps a tonic `Channel`).
#[derive(Clone)]
pub struct AgentTransportHandle {
    inner: AgentTransportClient<Channel>,
}

impl AgentTransportHandle {
    pub async fn connect(socket_path: &Path) -> Result<Self, ClientError> {
        let path = socket_path.to_path_buf();
        // The URI is never actually resolved to a network address; the
        // connector below ignores it and always dials the fixed Unix path.
        let channel = Endpoint::try_from("http://agentd.local")?
            .connect_with_connector(service_fn(move |_: Uri| {
                let path = path.clone();
                async move {
                    let stream = tokio::net::UnixStream::connect(path).await?;
                    Ok::<_, std::io::Error>(TokioIo::new(stream))
                }
            }))
            .await?;
        Ok(Self { inner: AgentTransportClient::new(channel) })
    }

    pub async fn session_connect(&mut self) -> Result<(SessionId, Bytes), ClientError> {
        let response = self.inner.connect(ConnectRequest {}).await?.into_inner();
        Ok((response.session_id, Bytes::from(response.greeting)))
    }

    pub async fn session_send(
        &mut self,
        session_id: &SessionId,
        block: Bytes,
    ) -> Result<Bytes, ClientError> {
        let response = self
            .inner
            .send(SendRequest { session_id: session_id.clone(), block: block.to_vec() })
            .await?
            .into_inner();
        Ok(Bytes::from(response.response))
    }

    pub async fn session_disconnect(&mut self, session_id: &SessionId) -> Result<(), ClientError> {
        self.inner
            .disconnect(DisconnectRequest { session_id: session_id.clone() })
            .await?;
        Ok(())
    }
}

/// Borrowed-path constructor used by [`crate::connection::Connection`],
/// which only ever knows the socket path, not an owned `PathBuf`.
pub async fn connect(socket_path: &PathBuf) -> Result<AgentTransportHandle, ClientError> {
    AgentTransportHandle::connect(socket_path).await
}
