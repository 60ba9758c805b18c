// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the commands-server transport.
//!
//! Wire format: 4-byte length prefix (little-endian, inclusive of itself) +
//! a binary `u32 command_id || payload` request, or `u32 status ||
//! per-command payload` response (spec §4.6).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod command;
mod error;
mod framing;
mod response;

pub use command::{decode_request, encode_request, CommandId, Request};
pub use error::ProtocolError;
pub use framing::{read_message, write_message, HEADER_LEN, MAX_TRANSPORT_MESSAGE};
pub use response::{decode_response, encode_response, Response, ResponseBody, SessionState};

/// Read one framed request off the wire.
pub async fn read_request<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Request, ProtocolError> {
    let body = read_message(reader).await?;
    decode_request(&body)
}

/// Write one response, framed, matching the command it answers.
pub async fn write_response<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), ProtocolError> {
    let body = encode_response(response);
    write_message(writer, &body).await
}
