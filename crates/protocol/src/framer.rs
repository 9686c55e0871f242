// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response-completion detection for the Assuan wire format.
//!
//! A response is complete when its last `\n`-terminated, non-empty line
//! starts with `OK`, `ERR `, or `INQUIRE `. If the caller is pulling in an
//! inquiry data payload, a lone `END` line also terminates. Prefixes that
//! appear in earlier, already-terminated lines never matter — only the most
//! recently terminated non-empty line is examined, so `OK`/`ERR`/`INQUIRE`
//! substrings embedded in data lines can't cause a false match.

/// What the last non-empty terminated line in a buffer means for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Ok,
    Err,
    Inquire,
    End,
}

/// Result of examining an accumulated response buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Incomplete,
    Complete(Terminator),
}

/// Examine `buf` (the full bytes accumulated so far for one logical
/// response) and decide whether it is complete.
///
/// `inquiry_payload` is true when the block the caller sent was itself a
/// `D ...` data payload — in that context a lone `END` line also counts as
/// a terminator, matching the caller's choice of outgoing block framing.
pub fn completion(buf: &[u8], inquiry_payload: bool) -> Completion {
    match last_terminated_nonempty_line(buf) {
        Some(line) => classify_line(line, inquiry_payload),
        None => Completion::Incomplete,
    }
}

/// Find the last `\n`-terminated, non-empty line in `buf`. Any unterminated
/// trailing fragment (bytes after the final `\n`) is ignored — it is not
/// yet a complete line and cannot affect the classification.
fn last_terminated_nonempty_line(buf: &[u8]) -> Option<&[u8]> {
    let mut end = match buf.iter().rposition(|&b| b == b'\n') {
        Some(pos) => pos,
        None => return None,
    };

    loop {
        let start = buf[..end].iter().rposition(|&b| b == b'\n').map(|p| p + 1).unwrap_or(0);
        let line = &buf[start..end];
        if !line.is_empty() {
            return Some(line);
        }
        if start == 0 {
            return None;
        }
        end = start - 1;
    }
}

fn classify_line(line: &[u8], inquiry_payload: bool) -> Completion {
    if starts_with_ok(line) {
        return Completion::Complete(Terminator::Ok);
    }
    if line.starts_with(b"ERR ") {
        return Completion::Complete(Terminator::Err);
    }
    if line.starts_with(b"INQUIRE ") {
        return Completion::Complete(Terminator::Inquire);
    }
    if inquiry_payload && line == b"END" {
        return Completion::Complete(Terminator::End);
    }
    Completion::Incomplete
}

fn starts_with_ok(line: &[u8]) -> bool {
    line == b"OK" || (line.len() > 2 && line.starts_with(b"OK") && line[2] == b' ')
}

/// Accumulates bytes for one logical Assuan response and reports when a
/// terminator line has arrived. Stateful wrapper around [`completion`] for
/// callers that receive data in arbitrarily-sized chunks.
#[derive(Debug, Default)]
pub struct Framer {
    buf: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of ingress bytes and re-evaluate completion.
    pub fn ingest(&mut self, chunk: &[u8], inquiry_payload: bool) -> Completion {
        self.buf.extend_from_slice(chunk);
        completion(&self.buf, inquiry_payload)
    }

    /// Current accumulated bytes (the response, once complete).
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Reset for the next response.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Take the accumulated bytes, resetting the framer.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

#[cfg(test)]
#[path = "framer_tests.rs"]
mod tests;
