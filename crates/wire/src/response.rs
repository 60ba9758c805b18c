// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Responses and their wire encoding: `u32 status || per-command payload`
//! (spec §4.6). Which payload shape to expect is determined by the request's
//! [`crate::CommandId`], since the binary body carries no self-describing
//! tag of its own; decoding a response therefore takes the command it
//! answers.

use dal_core::{AppletUuid, AppletVersion, FwVersion, Platform, SessionId, Status, TransportKind, VmFamily};

use crate::codec::{Reader, Writer};
use crate::command::CommandId;
use crate::error::ProtocolError;

/// Session state as reported by `GET_SESSION_INFO`. Spec §3 names only
/// `ACTIVE` as a record state; `NotExists` is the wire representation of "no
/// record" (spec §8 scenario 4: `get_session_info` returns `state =
/// NOT_EXISTS` after the session is GC'd).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    NotExists = 0,
    Active = 1,
}

impl SessionState {
    fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        match v {
            0 => Ok(Self::NotExists),
            1 => Ok(Self::Active),
            _ => Err(ProtocolError::UnknownCommand(v as u32)),
        }
    }
}

/// The per-command payload of a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Empty,
    SessionId(SessionId),
    Count(u32),
    SessionInfo { state: SessionState, flags: u32 },
    EventData { data_type: u8, data: Vec<u8> },
    SendAndReceive { rx: Vec<u8>, applet_response_code: i32 },
    Buffer(Vec<u8>),
    VersionInfo {
        jhi_version: AppletVersion,
        fw_version: FwVersion,
        comm_type: TransportKind,
        platform: Platform,
        vm_type: VmFamily,
    },
    UuidList(Vec<AppletUuid>),
    SdHandle(SessionId),
}

/// A full response: the status, and (only on success) the command-shaped
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub body: ResponseBody,
}

impl Response {
    pub fn ok(body: ResponseBody) -> Self {
        Self { status: Status::Success, body }
    }

    pub fn err(status: Status) -> Self {
        debug_assert!(!status.is_success(), "Response::err called with a success status");
        Self { status, body: ResponseBody::Empty }
    }
}

fn write_transport(w: &mut Writer, t: TransportKind) {
    w.u8(match t {
        TransportKind::Heci => 0,
        TransportKind::Emulation => 1,
    });
}

fn read_transport(r: &mut Reader<'_>) -> Result<TransportKind, ProtocolError> {
    Ok(match r.u8()? {
        0 => TransportKind::Heci,
        1 => TransportKind::Emulation,
        other => return Err(ProtocolError::UnknownCommand(other as u32)),
    })
}

fn write_platform(w: &mut Writer, p: Platform) {
    w.u8(match p {
        Platform::Me => 0,
        Platform::Sec => 1,
        Platform::Cse => 2,
    });
}

fn read_platform(r: &mut Reader<'_>) -> Result<Platform, ProtocolError> {
    Ok(match r.u8()? {
        0 => Platform::Me,
        1 => Platform::Sec,
        2 => Platform::Cse,
        other => return Err(ProtocolError::UnknownCommand(other as u32)),
    })
}

fn write_vm_family(w: &mut Writer, vm: VmFamily) {
    w.u8(match vm {
        VmFamily::Tl => 0,
        VmFamily::BhV1 => 1,
        VmFamily::BhV2 => 2,
    });
}

fn read_vm_family(r: &mut Reader<'_>) -> Result<VmFamily, ProtocolError> {
    Ok(match r.u8()? {
        0 => VmFamily::Tl,
        1 => VmFamily::BhV1,
        2 => VmFamily::BhV2,
        other => return Err(ProtocolError::UnknownCommand(other as u32)),
    })
}

/// Encode `u32 status || per-command payload` (payload omitted on failure).
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(response.status.code());
    if !response.status.is_success() {
        return w.into_bytes();
    }
    match &response.body {
        ResponseBody::Empty => {}
        ResponseBody::SessionId(id) | ResponseBody::SdHandle(id) => {
            w.session_id(id);
        }
        ResponseBody::Count(n) => {
            w.u32(*n);
        }
        ResponseBody::SessionInfo { state, flags } => {
            w.u8(*state as u8).u32(*flags);
        }
        ResponseBody::EventData { data_type, data } => {
            w.u8(*data_type).buffer(data);
        }
        ResponseBody::SendAndReceive { rx, applet_response_code } => {
            w.buffer(rx).i32(*applet_response_code);
        }
        ResponseBody::Buffer(data) => {
            w.buffer(data);
        }
        ResponseBody::VersionInfo { jhi_version, fw_version, comm_type, platform, vm_type } => {
            w.u16(jhi_version.major).u16(jhi_version.minor);
            w.u16(fw_version.major).u16(fw_version.minor).u16(fw_version.hotfix);
            write_transport(&mut w, *comm_type);
            write_platform(&mut w, *platform);
            write_vm_family(&mut w, *vm_type);
        }
        ResponseBody::UuidList(uuids) => {
            w.u32(uuids.len() as u32);
            for uuid in uuids {
                w.applet_uuid(uuid);
            }
        }
    }
    w.into_bytes()
}

/// Decode a response body for the command it answers.
pub fn decode_response(body: &[u8], command: CommandId) -> Result<Response, ProtocolError> {
    let mut r = Reader::new(body);
    let status = Status::from_code(r.u32()?);
    if !status.is_success() {
        r.finish()?;
        return Ok(Response { status, body: ResponseBody::Empty });
    }

    let body = match command {
        CommandId::Init | CommandId::Install | CommandId::Uninstall | CommandId::CloseSession
        | CommandId::SetSessionEventHandler | CommandId::CloseSdSession | CommandId::SendCmdPkg => {
            ResponseBody::Empty
        }
        CommandId::CreateSession => ResponseBody::SessionId(r.session_id()?),
        CommandId::CreateSdSession => ResponseBody::SdHandle(r.session_id()?),
        CommandId::GetSessionsCount => ResponseBody::Count(r.u32()?),
        CommandId::GetSessionInfo => {
            let state = SessionState::from_u8(r.u8()?)?;
            let flags = r.u32()?;
            ResponseBody::SessionInfo { state, flags }
        }
        CommandId::GetEventData => {
            let data_type = r.u8()?;
            let data = r.buffer("event_data")?;
            ResponseBody::EventData { data_type, data }
        }
        CommandId::SendAndReceive => {
            let rx = r.buffer("rx")?;
            let applet_response_code = r.i32()?;
            ResponseBody::SendAndReceive { rx, applet_response_code }
        }
        CommandId::GetAppletProperty => ResponseBody::Buffer(r.buffer("rx")?),
        CommandId::GetVersionInfo => {
            let jhi_version = AppletVersion::new(r.u16()?, r.u16()?);
            let fw_version = FwVersion::new(r.u16()?, r.u16()?, r.u16()?);
            let comm_type = read_transport(&mut r)?;
            let platform = read_platform(&mut r)?;
            let vm_type = read_vm_family(&mut r)?;
            ResponseBody::VersionInfo { jhi_version, fw_version, comm_type, platform, vm_type }
        }
        CommandId::ListInstalledTas | CommandId::ListInstalledSds => {
            let count = r.u32()? as usize;
            let mut uuids = Vec::with_capacity(count);
            for _ in 0..count {
                uuids.push(r.applet_uuid()?);
            }
            ResponseBody::UuidList(uuids)
        }
        CommandId::QueryTeeMetadata => ResponseBody::Buffer(r.buffer("metadata")?),
    };
    r.finish()?;
    Ok(Response { status, body })
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
