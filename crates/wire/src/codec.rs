// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Primitive little-endian encoders/decoders shared by [`crate::command`] and
//! [`crate::response`]. Every multi-byte field on the wire is little-endian
//! per spec; byte-count fields are validated against `JHI_BUFFER_MAX` as they
//! are read.

use crate::error::ProtocolError;
use dal_core::{AppletUuid, SessionId, JHI_BUFFER_MAX};

/// A cursor over an in-memory message body, used to decode one [`crate::Request`]
/// or [`crate::Response`] payload.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left unread; callers use this to reject trailing garbage.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::Truncated { wanted: n, have: self.remaining() });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.u8()? != 0)
    }

    pub fn u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(self.u32()? as i32)
    }

    pub fn u64(&mut self) -> Result<u64, ProtocolError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// A `u32` length followed by that many bytes, capped at `JHI_BUFFER_MAX`.
    pub fn buffer(&mut self, field: &'static str) -> Result<Vec<u8>, ProtocolError> {
        let len = self.u32()? as usize;
        if len > JHI_BUFFER_MAX {
            return Err(ProtocolError::BufferTooLarge { field, len, max: JHI_BUFFER_MAX });
        }
        Ok(self.take(len)?.to_vec())
    }

    /// A `u32` byte length followed by UTF-8 bytes (no trailing NUL).
    pub fn string(&mut self) -> Result<String, ProtocolError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    pub fn applet_uuid(&mut self) -> Result<AppletUuid, ProtocolError> {
        let bytes = self.take(32)?;
        let s = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
        Ok(AppletUuid::parse(s)?)
    }

    pub fn session_id(&mut self) -> Result<SessionId, ProtocolError> {
        let bytes = self.take(16)?;
        let mut arr = [0u8; 16];
        arr.copy_from_slice(bytes);
        Ok(SessionId::from_bytes(arr))
    }

    /// Fails if any bytes remain; called once decoding should be complete.
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.remaining() != 0 {
            return Err(ProtocolError::TrailingBytes(self.remaining()));
        }
        Ok(())
    }
}

/// Accumulates an encoded payload.
#[derive(Default)]
pub struct Writer(pub Vec<u8>);

impl Writer {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.0.push(v);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(v as u8)
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.u32(v as u32)
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn buffer(&mut self, bytes: &[u8]) -> &mut Self {
        self.u32(bytes.len() as u32);
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        self.buffer(s.as_bytes())
    }

    pub fn applet_uuid(&mut self, uuid: &AppletUuid) -> &mut Self {
        self.0.extend_from_slice(uuid.as_str().as_bytes());
        self
    }

    pub fn session_id(&mut self, id: &SessionId) -> &mut Self {
        self.0.extend_from_slice(id.as_bytes());
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
