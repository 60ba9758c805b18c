// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed set of status codes returned to host clients.
//!
//! Every public operation in this service returns a `Status` instead of
//! propagating an error type across subsystem boundaries (see spec's error
//! handling design: "no exceptions cross subsystem boundaries"). Codes are
//! partitioned into a JHI range (`0x0000..=0x1FFF`) and a TEE range
//! (`0x2000..=0x24FF`); BH_V2-only commands surface TEE codes on failure,
//! everything else surfaces JHI codes. `SUCCESS` is shared by both.

use thiserror::Error;

/// Upper bound (exclusive) of the JHI status range.
pub const JHI_RANGE_END: u32 = 0x2000;
/// Upper bound (exclusive) of the TEE status range.
pub const TEE_RANGE_END: u32 = 0x2500;

/// A status code returned from any daemon operation, and the value placed in
/// the wire response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[repr(u32)]
pub enum Status {
    #[error("success")]
    Success = 0x0000,

    // --- Handle / parameter validation ---
    #[error("insufficient buffer")]
    InsufficientBuffer = 0x0200,
    #[error("invalid handle")]
    InvalidHandle = 0x0201,
    #[error("invalid command")]
    InvalidCommand = 0x0202,
    #[error("invalid parameters")]
    InvalidParams = 0x0203,
    #[error("invalid applet guid")]
    InvalidAppletGuid = 0x0204,
    #[error("invalid session handle")]
    InvalidSessionHandle = 0x100F,
    #[error("invalid buffer size")]
    InvalidBufferSize = 0x1001,
    #[error("invalid communication buffer")]
    InvalidCommBuffer = 0x1002,

    // --- Install / repository ---
    #[error("file not found")]
    FileNotFound = 0x0101,
    #[error("file authentication error")]
    FileErrorAuth = 0x0102,
    #[error("file copy error")]
    FileErrorCopy = 0x0103,
    /// The blob being installed is byte-identical to an already-installed one.
    #[error("file identical to installed applet")]
    FileIdentical = 0x0104,
    #[error("invalid file")]
    FileInvalid = 0x0105,
    #[error("failed to update the applet registry entry")]
    ErrorRegistry = 0x0106,
    #[error("maximum installed applets reached")]
    MaxInstalledAppletsReached = 0x0404,
    #[error("non-shared sessions of this applet exist")]
    InstallFailureSessionsExist = 0x1008,
    #[error("install failed")]
    InstallFailed = 0x1009,

    // --- Runtime ---
    #[error("applet fatal error")]
    AppletFatal = 0x0400,
    #[error("applet timed out")]
    AppletTimeout = 0x0401,
    #[error("applet not installed")]
    AppletNotInstalled = 0x0402,
    #[error("maximum sessions reached")]
    MaxSessionsReached = 0x100C,
    #[error("shared sessions not supported by this applet")]
    SharedSessionNotSupported = 0x100D,
    #[error("maximum shared session owners reached")]
    MaxSharedSessionReached = 0x100E,
    #[error("session already registered for events")]
    SessionAlreadyRegistered = 0x1011,
    #[error("session not registered for events")]
    SessionNotRegistered = 0x1010,
    #[error("events not supported for shared sessions")]
    EventsNotSupported = 0x1012,
    /// Distinct from an error: the client polls `GET_EVENT_DATA` until drained.
    #[error("no events pending")]
    NoEvents = 0x1013,

    // --- Service ---
    #[error("no connection to firmware")]
    NoConnectionToFirmware = 0x0300,
    #[error("service unavailable")]
    ServiceUnavailable = 0x0301,
    #[error("internal error")]
    InternalError = 0x0601,
    #[error("unknown error")]
    UnknownError = 0x0600,

    // --- BH_V2 / TEE range ---
    #[error("tee internal error")]
    TeeInternalError = 0x2001,
    #[error("tee invalid parameters")]
    TeeInvalidParams = 0x2002,
    #[error("security domain not found")]
    TeeSdNotFound = 0x2003,
    #[error("security domain already exists")]
    TeeSdAlreadyExists = 0x2004,
}

impl Status {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }

    pub fn is_tee_range(self) -> bool {
        (JHI_RANGE_END..TEE_RANGE_END).contains(&self.code())
    }

    /// Decode a wire status code back into a `Status`.
    ///
    /// Unrecognized codes (e.g. from a future protocol version) decode to
    /// `UnknownError` rather than failing, matching the original's
    /// tolerance of forward-compatible unknown return codes.
    pub fn from_code(code: u32) -> Status {
        match code {
            0x0000 => Status::Success,
            0x0200 => Status::InsufficientBuffer,
            0x0201 => Status::InvalidHandle,
            0x0202 => Status::InvalidCommand,
            0x0203 => Status::InvalidParams,
            0x0204 => Status::InvalidAppletGuid,
            0x100F => Status::InvalidSessionHandle,
            0x1001 => Status::InvalidBufferSize,
            0x1002 => Status::InvalidCommBuffer,
            0x0101 => Status::FileNotFound,
            0x0102 => Status::FileErrorAuth,
            0x0103 => Status::FileErrorCopy,
            0x0104 => Status::FileIdentical,
            0x0105 => Status::FileInvalid,
            0x0106 => Status::ErrorRegistry,
            0x0404 => Status::MaxInstalledAppletsReached,
            0x1008 => Status::InstallFailureSessionsExist,
            0x1009 => Status::InstallFailed,
            0x0400 => Status::AppletFatal,
            0x0401 => Status::AppletTimeout,
            0x0402 => Status::AppletNotInstalled,
            0x100C => Status::MaxSessionsReached,
            0x100D => Status::SharedSessionNotSupported,
            0x100E => Status::MaxSharedSessionReached,
            0x1011 => Status::SessionAlreadyRegistered,
            0x1010 => Status::SessionNotRegistered,
            0x1012 => Status::EventsNotSupported,
            0x1013 => Status::NoEvents,
            0x0300 => Status::NoConnectionToFirmware,
            0x0301 => Status::ServiceUnavailable,
            0x0601 => Status::InternalError,
            0x2001 => Status::TeeInternalError,
            0x2002 => Status::TeeInvalidParams,
            0x2003 => Status::TeeSdNotFound,
            0x2004 => Status::TeeSdAlreadyExists,
            _ => Status::UnknownError,
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
