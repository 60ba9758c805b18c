// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifiers used throughout the daemon: applet UUIDs and session ids.

use std::borrow::Borrow;
use std::fmt;

/// An applet UUID: exactly 32 uppercase hex characters, with no separators.
///
/// Stored as an inline fixed-size buffer (no heap allocation) since every
/// instance is exactly 32 ASCII bytes once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppletUuid([u8; 32]);

/// An applet UUID failed format validation (spec: "32 uppercase hex").
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid applet uuid: expected 32 uppercase hex characters")]
pub struct InvalidAppletUuid;

impl AppletUuid {
    /// Parse and uppercase-validate an applet UUID string.
    ///
    /// Per spec §3, applet records are keyed by the *uppercased* 32-hex-char
    /// string; this constructor uppercases lowercase hex digits so callers
    /// don't need to normalize case themselves, but rejects anything that
    /// isn't a hex digit.
    pub fn parse(s: &str) -> Result<Self, InvalidAppletUuid> {
        let bytes = s.as_bytes();
        if bytes.len() != 32 {
            return Err(InvalidAppletUuid);
        }
        let mut out = [0u8; 32];
        for (i, &b) in bytes.iter().enumerate() {
            out[i] = match b {
                b'0'..=b'9' | b'A'..=b'F' => b,
                b'a'..=b'f' => b - b'a' + b'A',
                _ => return Err(InvalidAppletUuid),
            };
        }
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        // Invariant: `parse` only ever stores ASCII hex bytes.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for AppletUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Borrow<str> for AppletUuid {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl serde::Serialize for AppletUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for AppletUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <&str>::deserialize(deserializer)?;
        AppletUuid::parse(s).map_err(serde::de::Error::custom)
    }
}

/// A 128-bit session identifier, generated per-session by the daemon.
///
/// Spec I1: "Session-table keys are unique; a session id is never reused
/// within one process lifetime" — generation draws from the OS RNG rather
/// than a counter, so restart does not risk collision with sessions a
/// still-connected client might remember (there are none, since sessions
/// don't survive restarts, but fresh randomness is also what makes `Eq`
/// collisions practically impossible within one run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId([u8; 16]);

impl SessionId {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Generate a new random session id.
    pub fn new() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
