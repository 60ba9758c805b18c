// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Async length-prefixed framing for the commands-server transport (spec §4.6,
//! §4.7).
//!
//! `u32 total_length || payload`, little-endian, where `total_length` is the
//! on-wire byte count of the *whole* message, including the 4-byte length
//! field itself — unlike a conventional length-exclusive prefix, a reader
//! must subtract the header size before reading the body.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Length-field width, in bytes.
pub const HEADER_LEN: usize = 4;

/// Upper bound on a whole framed message (header + body). Bigger than
/// `JHI_BUFFER_MAX` alone to leave room for a command header and the other
/// fixed fields (UUIDs, session ids, owner tuples) accompanying a buffer.
pub const MAX_TRANSPORT_MESSAGE: usize = dal_core::JHI_BUFFER_MAX + 4096;

/// Read one framed message, returning the body (the bytes after
/// `total_length`). Rejects messages that fail the header-size or
/// transport-cap checks before reading the body off the wire.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).await?;
    let total_length = u32::from_le_bytes(header) as usize;

    if total_length < HEADER_LEN {
        return Err(ProtocolError::ShortHeader(HEADER_LEN));
    }
    if total_length > MAX_TRANSPORT_MESSAGE {
        return Err(ProtocolError::TooLarge(total_length, MAX_TRANSPORT_MESSAGE));
    }

    let body_len = total_length - HEADER_LEN;
    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Write one framed message: the `total_length` prefix (inclusive of itself)
/// followed by `body`.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> Result<(), ProtocolError> {
    let total_length = HEADER_LEN + body.len();
    if total_length > MAX_TRANSPORT_MESSAGE {
        return Err(ProtocolError::TooLarge(total_length, MAX_TRANSPORT_MESSAGE));
    }
    writer.write_all(&(total_length as u32).to_le_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "framing_tests.rs"]
mod tests;
