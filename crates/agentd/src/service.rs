// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gRPC front door exposing the three AT operations to the client mediator:
//! `Connect`, `Send`, `Disconnect`.

use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::proto::agent_transport_server::AgentTransport;
use crate::proto::{
    ConnectRequest, ConnectResponse, DisconnectRequest, DisconnectResponse, SendRequest,
    SendResponse,
};
use crate::session::{SessionId, SessionStore};

pub struct AgentTransportService {
    store: Arc<SessionStore>,
}

impl AgentTransportService {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl AgentTransport for AgentTransportService {
    async fn connect(
        &self,
        _request: Request<ConnectRequest>,
    ) -> Result<Response<ConnectResponse>, Status> {
        let (id, greeting) = self.store.connect().await?;
        Ok(Response::new(ConnectResponse {
            session_id: id.to_string(),
            greeting: greeting.to_vec(),
        }))
    }

    async fn send(&self, request: Request<SendRequest>) -> Result<Response<SendResponse>, Status> {
        let req = request.into_inner();
        let id = parse_session_id(&req.session_id)?;
        let response = self.store.send(id, Bytes::from(req.block)).await?;
        Ok(Response::new(SendResponse { response: response.to_vec() }))
    }

    async fn disconnect(
        &self,
        request: Request<DisconnectRequest>,
    ) -> Result<Response<DisconnectResponse>, Status> {
        let req = request.into_inner();
        let id = parse_session_id(&req.session_id)?;
        self.store.disconnect(id).await?;
        debug!(session = %id, "session disconnected");
        Ok(Response::new(DisconnectResponse {}))
    }
}

fn parse_session_id(raw: &str) -> Result<SessionId, Status> {
    SessionId::from_str(raw).map_err(|_| {
        warn!(session_id = raw, "malformed session id on the wire");
        Status::invalid_argument("malformed session id")
    })
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
