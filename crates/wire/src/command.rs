// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands and their wire encoding (spec §4.6's command table).

use dal_core::{AppletUuid, Owner, SessionId};

use crate::codec::{Reader, Writer};
use crate::error::ProtocolError;

/// The 18 commands the dispatcher understands, in the order of spec §4.6's
/// table. The numeric id is what travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandId {
    Init = 0,
    Install = 1,
    Uninstall = 2,
    CreateSession = 3,
    CloseSession = 4,
    GetSessionsCount = 5,
    GetSessionInfo = 6,
    SetSessionEventHandler = 7,
    GetEventData = 8,
    SendAndReceive = 9,
    GetAppletProperty = 10,
    GetVersionInfo = 11,
    ListInstalledTas = 12,
    ListInstalledSds = 13,
    CreateSdSession = 14,
    CloseSdSession = 15,
    SendCmdPkg = 16,
    QueryTeeMetadata = 17,
}

impl CommandId {
    pub fn from_u32(v: u32) -> Result<Self, ProtocolError> {
        Ok(match v {
            0 => Self::Init,
            1 => Self::Install,
            2 => Self::Uninstall,
            3 => Self::CreateSession,
            4 => Self::CloseSession,
            5 => Self::GetSessionsCount,
            6 => Self::GetSessionInfo,
            7 => Self::SetSessionEventHandler,
            8 => Self::GetEventData,
            9 => Self::SendAndReceive,
            10 => Self::GetAppletProperty,
            11 => Self::GetVersionInfo,
            12 => Self::ListInstalledTas,
            13 => Self::ListInstalledSds,
            14 => Self::CreateSdSession,
            15 => Self::CloseSdSession,
            16 => Self::SendCmdPkg,
            17 => Self::QueryTeeMetadata,
            other => return Err(ProtocolError::UnknownCommand(other)),
        })
    }

    /// `SEND_AND_RECEIVE` is the one command that skips the dispatcher's
    /// global mutex (spec §5, lock #2).
    pub fn skips_global_mutex(self) -> bool {
        matches!(self, Self::SendAndReceive)
    }

    /// Commands that only exist for BH_V2 (Security Domain admin + TEE
    /// metadata); surfaced errors for these use the TEE status range.
    pub fn is_bh_v2_only(self) -> bool {
        matches!(
            self,
            Self::ListInstalledTas
                | Self::ListInstalledSds
                | Self::CreateSdSession
                | Self::CloseSdSession
                | Self::SendCmdPkg
                | Self::QueryTeeMetadata
        )
    }
}

/// One decoded client request, carrying its command's payload fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Init,
    Install { uuid: AppletUuid, path: String },
    Uninstall { uuid: AppletUuid },
    CreateSession { uuid: AppletUuid, flags: u32, init_buf: Vec<u8>, owner: Owner },
    CloseSession { session_id: SessionId, owner: Option<Owner>, force: bool },
    GetSessionsCount { uuid: AppletUuid },
    GetSessionInfo { session_id: SessionId },
    SetSessionEventHandler { session_id: SessionId, handle_name: String },
    GetEventData { session_id: SessionId },
    SendAndReceive { session_id: SessionId, cmd_id: u32, tx: Vec<u8>, rx_len: u32 },
    GetAppletProperty { uuid: AppletUuid, tx: Vec<u8> },
    GetVersionInfo,
    ListInstalledTas { sd_handle: SessionId },
    ListInstalledSds { sd_handle: SessionId },
    CreateSdSession { sd_uuid: AppletUuid },
    CloseSdSession { sd_handle: SessionId },
    SendCmdPkg { sd_handle: SessionId, pkg: Vec<u8> },
    QueryTeeMetadata,
}

impl Request {
    pub fn command_id(&self) -> CommandId {
        match self {
            Self::Init => CommandId::Init,
            Self::Install { .. } => CommandId::Install,
            Self::Uninstall { .. } => CommandId::Uninstall,
            Self::CreateSession { .. } => CommandId::CreateSession,
            Self::CloseSession { .. } => CommandId::CloseSession,
            Self::GetSessionsCount { .. } => CommandId::GetSessionsCount,
            Self::GetSessionInfo { .. } => CommandId::GetSessionInfo,
            Self::SetSessionEventHandler { .. } => CommandId::SetSessionEventHandler,
            Self::GetEventData { .. } => CommandId::GetEventData,
            Self::SendAndReceive { .. } => CommandId::SendAndReceive,
            Self::GetAppletProperty { .. } => CommandId::GetAppletProperty,
            Self::GetVersionInfo => CommandId::GetVersionInfo,
            Self::ListInstalledTas { .. } => CommandId::ListInstalledTas,
            Self::ListInstalledSds { .. } => CommandId::ListInstalledSds,
            Self::CreateSdSession { .. } => CommandId::CreateSdSession,
            Self::CloseSdSession { .. } => CommandId::CloseSdSession,
            Self::SendCmdPkg { .. } => CommandId::SendCmdPkg,
            Self::QueryTeeMetadata => CommandId::QueryTeeMetadata,
        }
    }
}

fn write_owner(w: &mut Writer, owner: &Owner) {
    w.u32(owner.pid).u64(owner.start_time);
}

fn read_owner(r: &mut Reader<'_>) -> Result<Owner, ProtocolError> {
    let pid = r.u32()?;
    let start_time = r.u64()?;
    Ok(Owner::new(pid, start_time))
}

/// Encode a full request: `u32 command_id || payload`.
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(request.command_id() as u32);
    match request {
        Request::Init | Request::GetVersionInfo | Request::QueryTeeMetadata => {}
        Request::Install { uuid, path } => {
            w.applet_uuid(uuid).string(path);
        }
        Request::Uninstall { uuid } => {
            w.applet_uuid(uuid);
        }
        Request::CreateSession { uuid, flags, init_buf, owner } => {
            w.applet_uuid(uuid).u32(*flags).buffer(init_buf);
            write_owner(&mut w, owner);
        }
        Request::CloseSession { session_id, owner, force } => {
            w.session_id(session_id);
            w.bool(owner.is_some());
            if let Some(owner) = owner {
                write_owner(&mut w, owner);
            }
            w.bool(*force);
        }
        Request::GetSessionsCount { uuid } => {
            w.applet_uuid(uuid);
        }
        Request::GetSessionInfo { session_id } => {
            w.session_id(session_id);
        }
        Request::SetSessionEventHandler { session_id, handle_name } => {
            w.session_id(session_id).string(handle_name);
        }
        Request::GetEventData { session_id } => {
            w.session_id(session_id);
        }
        Request::SendAndReceive { session_id, cmd_id, tx, rx_len } => {
            w.session_id(session_id).u32(*cmd_id).buffer(tx).u32(*rx_len);
        }
        Request::GetAppletProperty { uuid, tx } => {
            w.applet_uuid(uuid).buffer(tx);
        }
        Request::ListInstalledTas { sd_handle } | Request::ListInstalledSds { sd_handle } => {
            w.session_id(sd_handle);
        }
        Request::CreateSdSession { sd_uuid } => {
            w.applet_uuid(sd_uuid);
        }
        Request::CloseSdSession { sd_handle } => {
            w.session_id(sd_handle);
        }
        Request::SendCmdPkg { sd_handle, pkg } => {
            w.session_id(sd_handle).buffer(pkg);
        }
    }
    w.into_bytes()
}

/// Decode a full request body: `u32 command_id || payload`.
pub fn decode_request(body: &[u8]) -> Result<Request, ProtocolError> {
    let mut r = Reader::new(body);
    let command = CommandId::from_u32(r.u32()?)?;
    let request = match command {
        CommandId::Init => Request::Init,
        CommandId::Install => {
            let uuid = r.applet_uuid()?;
            let path = r.string()?;
            Request::Install { uuid, path }
        }
        CommandId::Uninstall => Request::Uninstall { uuid: r.applet_uuid()? },
        CommandId::CreateSession => {
            let uuid = r.applet_uuid()?;
            let flags = r.u32()?;
            let init_buf = r.buffer("init_buf")?;
            let owner = read_owner(&mut r)?;
            Request::CreateSession { uuid, flags, init_buf, owner }
        }
        CommandId::CloseSession => {
            let session_id = r.session_id()?;
            let has_owner = r.bool()?;
            let owner = if has_owner { Some(read_owner(&mut r)?) } else { None };
            let force = r.bool()?;
            Request::CloseSession { session_id, owner, force }
        }
        CommandId::GetSessionsCount => Request::GetSessionsCount { uuid: r.applet_uuid()? },
        CommandId::GetSessionInfo => Request::GetSessionInfo { session_id: r.session_id()? },
        CommandId::SetSessionEventHandler => {
            let session_id = r.session_id()?;
            let handle_name = r.string()?;
            Request::SetSessionEventHandler { session_id, handle_name }
        }
        CommandId::GetEventData => Request::GetEventData { session_id: r.session_id()? },
        CommandId::SendAndReceive => {
            let session_id = r.session_id()?;
            let cmd_id = r.u32()?;
            let tx = r.buffer("tx")?;
            let rx_len = r.u32()?;
            Request::SendAndReceive { session_id, cmd_id, tx, rx_len }
        }
        CommandId::GetAppletProperty => {
            let uuid = r.applet_uuid()?;
            let tx = r.buffer("tx")?;
            Request::GetAppletProperty { uuid, tx }
        }
        CommandId::GetVersionInfo => Request::GetVersionInfo,
        CommandId::ListInstalledTas => Request::ListInstalledTas { sd_handle: r.session_id()? },
        CommandId::ListInstalledSds => Request::ListInstalledSds { sd_handle: r.session_id()? },
        CommandId::CreateSdSession => Request::CreateSdSession { sd_uuid: r.applet_uuid()? },
        CommandId::CloseSdSession => Request::CloseSdSession { sd_handle: r.session_id()? },
        CommandId::SendCmdPkg => {
            let sd_handle = r.session_id()?;
            let pkg = r.buffer("pkg")?;
            Request::SendCmdPkg { sd_handle, pkg }
        }
        CommandId::QueryTeeMetadata => Request::QueryTeeMetadata,
    };
    r.finish()?;
    Ok(request)
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
