// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the client mediator, following the Protocol /
//! Resource-cleanup classes in the proxy's error-handling design.

use thiserror::Error;

use crate::fsm::{Event, State};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("illegal transition: {event:?} in state {state:?}")]
pub struct InvalidTransition {
    pub state: State,
    pub event: Event,
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind rendezvous socket at {path}: {source}")]
    Bind { path: String, source: std::io::Error },
    #[error("failed to set rendezvous socket permissions: {0}")]
    Permissions(std::io::Error),
}
