// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared, I/O-free Assuan wire utilities used by both the agent transport
//! and the client mediator: response-completion detection, command/inquiry
//! extraction, and rendezvous-file parsing.

pub mod extract;
pub mod framer;
pub mod rendezvous;

pub use extract::{extract_command, extract_inquiry_block};
pub use framer::{Completion, Framer, Terminator};
pub use rendezvous::{parse as parse_rendezvous, RendezvousDescriptor, RendezvousError};
