// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors raised while framing or decoding a wire message.

use thiserror::Error;

/// Anything that can go wrong turning bytes on the wire into a [`crate::Request`]
/// or [`crate::Response`], or back.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message shorter than the {0}-byte header")]
    ShortHeader(usize),

    #[error("declared total_length {declared} does not match transport length {actual}")]
    LengthMismatch { declared: u32, actual: u32 },

    #[error("message body truncated: wanted {wanted} bytes, had {have}")]
    Truncated { wanted: usize, have: usize },

    #[error("message size {0} exceeds the transport cap of {1} bytes")]
    TooLarge(usize, usize),

    #[error("unknown command id {0}")]
    UnknownCommand(u32),

    #[error("unknown status code {0:#06x}")]
    UnknownStatus(u32),

    #[error("invalid applet uuid on the wire: {0}")]
    InvalidUuid(#[from] dal_core::InvalidAppletUuid),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("{field} of {len} bytes exceeds JHI_BUFFER_MAX ({max} bytes)")]
    BufferTooLarge { field: &'static str, len: usize, max: usize },

    #[error("{0} trailing byte(s) after decoding a complete message")]
    TrailingBytes(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
