// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent Transport: owns authenticated sessions to the key agent and
//! exposes them to the client mediator over gRPC.

pub mod config;
pub mod error;
pub mod handshake;
pub mod service;
pub mod session;

pub mod proto {
    tonic::include_proto!("agentd.v1");
}
