// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! BH_V2 security-domain session handles (spec's `OPEN_SD_SESSION` /
//! `CLOSE_SD_SESSION` / `SEND_CMD_PKG` / `LIST_INSTALLED_TAS` /
//! `LIST_INSTALLED_SDS`). These are typed on the wire as [`SessionId`] like
//! regular applet sessions, but the plugin ABI hands back a bare
//! [`VmHandle`], so the engine keeps its own small lookup table rather than
//! routing them through [`dal_session::SessionManager`], which only tracks
//! applet sessions.

use std::collections::HashMap;

use dal_core::SessionId;
use dal_plugin::VmHandle;
use parking_lot::Mutex;

#[derive(Default)]
pub struct SdSessionTable {
    by_session_id: Mutex<HashMap<SessionId, VmHandle>>,
}

impl SdSessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, vm_handle: VmHandle) -> SessionId {
        let session_id = SessionId::new();
        self.by_session_id.lock().insert(session_id, vm_handle);
        session_id
    }

    pub fn vm_handle(&self, session_id: SessionId) -> Option<VmHandle> {
        self.by_session_id.lock().get(&session_id).copied()
    }

    pub fn remove(&self, session_id: SessionId) -> Option<VmHandle> {
        self.by_session_id.lock().remove(&session_id)
    }

    pub fn clear(&self) {
        self.by_session_id.lock().clear();
    }
}

#[cfg(test)]
#[path = "sd_sessions_tests.rs"]
mod tests;
