// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parses the agent's rendezvous file: `<decimal port>\n<16 raw cookie bytes>`.

use thiserror::Error;

pub const COOKIE_LEN: usize = 16;
const PORT_SEARCH_WINDOW: usize = 64;

/// Parsed contents of a rendezvous file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendezvousDescriptor {
    pub port: u16,
    pub cookie: [u8; COOKIE_LEN],
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RendezvousError {
    #[error("rendezvous file has no newline within the first 64 bytes")]
    NoNewline,
    #[error("rendezvous file port is not a valid decimal number")]
    BadPort,
    #[error("rendezvous file has fewer than 16 bytes after the newline")]
    ShortCookie,
}

/// Parse the raw bytes of a rendezvous file. Trailing bytes beyond the
/// cookie are ignored.
pub fn parse(data: &[u8]) -> Result<RendezvousDescriptor, RendezvousError> {
    let window = &data[..data.len().min(PORT_SEARCH_WINDOW)];
    let newline_pos = window.iter().position(|&b| b == b'\n').ok_or(RendezvousError::NoNewline)?;

    let port_str = std::str::from_utf8(&data[..newline_pos]).map_err(|_| RendezvousError::BadPort)?;
    let port: u16 = port_str.trim_end_matches('\r').parse().map_err(|_| RendezvousError::BadPort)?;

    let cookie_start = newline_pos + 1;
    let cookie_end = cookie_start + COOKIE_LEN;
    if data.len() < cookie_end {
        return Err(RendezvousError::ShortCookie);
    }

    let mut cookie = [0u8; COOKIE_LEN];
    cookie.copy_from_slice(&data[cookie_start..cookie_end]);
    Ok(RendezvousDescriptor { port, cookie })
}

#[cfg(test)]
#[path = "rendezvous_tests.rs"]
mod tests;
