// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the agent transport, following the Configuration /
//! Authentication / Transport classes in the proxy's error-handling design.

use thiserror::Error;
use tonic::Status;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("rendezvous file is missing")]
    RendezvousMissing,
    #[error("rendezvous file is malformed")]
    RendezvousMalformed,
    #[error("connect to agent timed out")]
    ConnectTimeout,
    #[error("failed to write auth cookie")]
    AuthWriteFailed,
    #[error("agent rejected greeting: {0}")]
    GreetingRejected(String),
    #[error("agent closed the connection before sending a greeting")]
    GreetingAborted,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("unknown session")]
    UnknownSession,
    #[error("write to agent socket failed")]
    SocketWriteFailed,
    #[error("agent socket closed before response completed")]
    SocketClosedMidResponse,
    #[error("agent socket error: {0}")]
    SocketError(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisconnectError {
    #[error("unknown session")]
    UnknownSession,
    #[error("disconnect exchange failed: {0}")]
    Failed(String),
}

impl From<HandshakeError> for Status {
    fn from(err: HandshakeError) -> Self {
        match err {
            HandshakeError::RendezvousMissing | HandshakeError::RendezvousMalformed => {
                Status::failed_precondition(err.to_string())
            }
            HandshakeError::ConnectTimeout => Status::deadline_exceeded(err.to_string()),
            HandshakeError::AuthWriteFailed
            | HandshakeError::GreetingRejected(_)
            | HandshakeError::GreetingAborted => Status::unauthenticated(err.to_string()),
        }
    }
}

impl From<SendError> for Status {
    fn from(err: SendError) -> Self {
        match err {
            SendError::UnknownSession => Status::not_found(err.to_string()),
            SendError::SocketWriteFailed
            | SendError::SocketClosedMidResponse
            | SendError::SocketError(_) => Status::unavailable(err.to_string()),
        }
    }
}

impl From<DisconnectError> for Status {
    fn from(err: DisconnectError) -> Self {
        match err {
            DisconnectError::UnknownSession => Status::not_found(err.to_string()),
            DisconnectError::Failed(_) => Status::unavailable(err.to_string()),
        }
    }
}
