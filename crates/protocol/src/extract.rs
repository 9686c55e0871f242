// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure extractors over a growing byte buffer: pull a complete client
//! command (newline-terminated) or a complete inquiry data block
//! (`END\n`-terminated) out of whatever has arrived so far. Both operate on
//! opaque bytes — no text normalization, no UTF-8 interpretation.

use bytes::{Bytes, BytesMut};

/// If `buf` contains a `\n`, remove and return the prefix up to and
/// including that byte. Otherwise leave `buf` untouched and return `None`.
pub fn extract_command(buf: &mut BytesMut) -> Option<Bytes> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    Some(buf.split_to(pos + 1).freeze())
}

/// If `buf` contains the four-byte sequence `END\n`, remove and return the
/// prefix up to and including it. A literal `END` not immediately followed
/// by its own `\n` (e.g. embedded in a data line as `END ` or `ENDX`) does
/// not match.
pub fn extract_inquiry_block(buf: &mut BytesMut) -> Option<Bytes> {
    let pos = find_end_marker(buf)?;
    Some(buf.split_to(pos + 4).freeze())
}

fn find_end_marker(buf: &[u8]) -> Option<usize> {
    if buf.len() < 4 {
        return None;
    }
    buf.windows(4).position(|w| w == b"END\n")
}

#[cfg(test)]
#[path = "extract_tests.rs"]
mod tests;
