// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command Dispatcher (spec §4.6, C6): routes one decoded [`Request`] to the
//! subsystem that answers it, enforcing spec §5's lock order.

use std::path::Path;

use dal_core::{AppletVersion, Status};
use dal_plugin::{EventData, VmPlugin};
use dal_wire::{Request, Response, ResponseBody, SessionState};

use crate::globals::InitializedState;
use crate::sd_sessions::SdSessionTable;

/// This daemon's own API version, reported in `GET_VERSION_INFO`'s
/// `jhi_version` field. Bumped when the wire protocol changes.
const JHI_VERSION: AppletVersion = AppletVersion::new(8, 0);

fn is_acp_path(path: &str) -> bool {
    Path::new(path).extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("acp"))
}

/// Route `request` against the initialized subsystems. The caller is
/// responsible for the global mutex (spec §5 lock #2): every command except
/// `SEND_AND_RECEIVE` is expected to already hold it by the time this runs.
pub async fn dispatch<P: VmPlugin>(state: &InitializedState<P>, sd_sessions: &SdSessionTable, plugin: &P, request: Request) -> Response {
    match request {
        Request::Init => Response::ok(ResponseBody::Empty),

        Request::Install { uuid, path } => {
            let is_acp = is_acp_path(&path);
            let status = state.applets.install(&uuid, Path::new(&path), true, is_acp).await;
            respond_empty(status)
        }

        Request::Uninstall { uuid } => respond_empty(state.applets.uninstall(&uuid).await),

        Request::CreateSession { uuid, flags, init_buf, owner } => {
            let shared = flags & dal_core::FLAG_SHARED_SESSION != 0;
            let applet_supports_shared = state.applets.is_shared_session_supported(&uuid);
            match state.sessions.create_session(uuid, flags, shared, &init_buf, owner, applet_supports_shared).await {
                Ok(session_id) => Response::ok(ResponseBody::SessionId(session_id)),
                Err(status) => Response::err(status),
            }
        }

        Request::CloseSession { session_id, owner, force } => respond_empty(state.sessions.close_session(session_id, owner, force).await),

        Request::GetSessionsCount { uuid } => Response::ok(ResponseBody::Count(state.sessions.sessions_count(&uuid))),

        Request::GetSessionInfo { session_id } => {
            // Always SUCCESS: `NotExists` *is* the answer, not an error
            // (spec §8 scenario 4).
            let flags = state.sessions.session_flags(session_id);
            let (session_state, flags) = match flags {
                Some(flags) => (SessionState::Active, flags),
                None => (SessionState::NotExists, 0),
            };
            Response::ok(ResponseBody::SessionInfo { state: session_state, flags })
        }

        Request::SetSessionEventHandler { session_id, handle_name } => {
            respond_empty(state.sessions.set_session_event_handler(session_id, &handle_name))
        }

        Request::GetEventData { session_id } => match state.sessions.get_event_data(session_id) {
            Ok(EventData { data_type, data }) => Response::ok(ResponseBody::EventData { data_type, data }),
            Err(status) => Response::err(status),
        },

        Request::SendAndReceive { session_id, cmd_id, tx, rx_len } => send_and_receive(state, plugin, session_id, cmd_id, &tx, rx_len).await,

        Request::GetAppletProperty { uuid, tx } => match plugin.get_applet_property(&uuid, &tx).await {
            Ok(rx) => Response::ok(ResponseBody::Buffer(rx)),
            Err(status) => Response::err(status),
        },

        Request::GetVersionInfo => Response::ok(ResponseBody::VersionInfo {
            jhi_version: JHI_VERSION,
            fw_version: state.fw_version,
            comm_type: state.transport_kind,
            platform: state.platform,
            vm_type: plugin.vm_family(),
        }),

        Request::ListInstalledTas { sd_handle } => match sd_sessions.vm_handle(sd_handle) {
            Some(vm_handle) => match plugin.list_installed_tas(vm_handle).await {
                Ok(uuids) => Response::ok(ResponseBody::UuidList(uuids)),
                Err(status) => Response::err(status),
            },
            None => Response::err(Status::InvalidSessionHandle),
        },

        Request::ListInstalledSds { sd_handle } => match sd_sessions.vm_handle(sd_handle) {
            Some(vm_handle) => match plugin.list_installed_sds(vm_handle).await {
                Ok(uuids) => Response::ok(ResponseBody::UuidList(uuids)),
                Err(status) => Response::err(status),
            },
            None => Response::err(Status::InvalidSessionHandle),
        },

        Request::CreateSdSession { sd_uuid } => match plugin.open_sd_session(&sd_uuid).await {
            Ok(vm_handle) => Response::ok(ResponseBody::SdHandle(sd_sessions.insert(vm_handle))),
            Err(status) => Response::err(status),
        },

        Request::CloseSdSession { sd_handle } => match sd_sessions.vm_handle(sd_handle) {
            Some(vm_handle) => {
                let status = plugin.close_sd_session(vm_handle).await;
                if status.is_ok() {
                    sd_sessions.remove(sd_handle);
                }
                respond_empty_result(status)
            }
            None => Response::err(Status::TeeSdNotFound),
        },

        Request::SendCmdPkg { sd_handle, pkg } => match sd_sessions.vm_handle(sd_handle) {
            Some(vm_handle) => respond_empty_result(plugin.send_cmd_pkg(vm_handle, &pkg).await),
            None => Response::err(Status::TeeSdNotFound),
        },

        Request::QueryTeeMetadata => match plugin.query_tee_metadata().await {
            Ok(data) => Response::ok(ResponseBody::Buffer(data)),
            Err(status) => Response::err(status),
        },
    }
}

async fn send_and_receive<P: VmPlugin>(state: &InitializedState<P>, plugin: &P, session_id: dal_core::SessionId, cmd_id: u32, tx: &[u8], rx_len: u32) -> Response {
    let Some(vm_handle) = state.sessions.get_vm_handle(session_id) else { return Response::err(Status::InvalidSessionHandle) };
    // Spec §5 lock #4: held for the VM round trip so a concurrent
    // CLOSE_SESSION can't race the applet mid-call.
    let Some(_guard) = state.sessions.acquire_session_lock(session_id).await else {
        return Response::err(Status::InvalidSessionHandle);
    };
    match plugin.send_and_recv(vm_handle, cmd_id, tx, rx_len).await {
        Ok((rx, applet_response_code)) => Response::ok(ResponseBody::SendAndReceive { rx, applet_response_code }),
        Err(Status::AppletFatal) => {
            state.sessions.remove(session_id);
            Response::err(Status::AppletFatal)
        }
        Err(status) => Response::err(status),
    }
}

fn respond_empty(status: Status) -> Response {
    if status.is_success() {
        Response::ok(ResponseBody::Empty)
    } else {
        Response::err(status)
    }
}

fn respond_empty_result(result: Result<(), Status>) -> Response {
    match result {
        Ok(()) => Response::ok(ResponseBody::Empty),
        Err(status) => Response::err(status),
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
