// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-memory [`VmPlugin`] standing in for the coprocessor in tests,
//! simulating the two reference applets spec §8 names: the echo applet
//! (`SEND_AND_RECEIVE` returns its input verbatim, `applet_response_code`
//! equal to the input length; command `1000` simulates an infinite loop and
//! faults) and an event-service applet (command `10` pushes an event to the
//! spooler queue).

use std::collections::HashMap;
use std::sync::mpsc as blocking_mpsc;

use async_trait::async_trait;
use dal_core::{AppletUuid, FwVersion, Status, TransportKind, VmFamily};
use parking_lot::Mutex;

use crate::plugin::VmPlugin;
use crate::types::{EventData, SpoolerEvent, VmHandle};

/// UUID of the reference echo applet used throughout spec §8's scenarios.
pub const ECHO_APPLET_UUID: &str = "D1DE41D82B844FEAA7FA1E4322F15DEE";
/// UUID of the reference event-service applet (spec §8 scenario 5).
pub const EVENT_SERVICE_APPLET_UUID: &str = "CAFEBABECAFEBABECAFEBABECAFEBABE";

/// Command id that makes the fake echo applet never return (spec §8
/// scenario 6: "send command 1000 (infinite loop)").
pub const CMD_INFINITE_LOOP: u32 = 1000;
/// Command id the reference event-service applet treats as "emit one event".
pub const CMD_EMIT_EVENT: u32 = 10;

struct Inner {
    installed: HashMap<AppletUuid, Vec<u8>>,
    sessions: HashMap<VmHandle, AppletUuid>,
    sd_sessions: HashMap<VmHandle, AppletUuid>,
    next_handle: VmHandle,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            installed: HashMap::new(),
            sessions: HashMap::new(),
            sd_sessions: HashMap::new(),
            next_handle: 1,
        }
    }
}

/// A fully in-memory VM, for use in daemon/engine/session tests without a
/// real coprocessor.
pub struct FakePlugin {
    vm_family: VmFamily,
    inner: Mutex<Inner>,
    max_sessions_per_applet: usize,
    event_tx: blocking_mpsc::Sender<SpoolerEvent>,
    event_rx: Mutex<blocking_mpsc::Receiver<SpoolerEvent>>,
}

impl FakePlugin {
    pub fn new(vm_family: VmFamily) -> Self {
        let (event_tx, event_rx) = blocking_mpsc::channel();
        Self {
            vm_family,
            inner: Mutex::new(Inner::default()),
            max_sessions_per_applet: 16,
            event_tx,
            event_rx: Mutex::new(event_rx),
        }
    }

    pub fn with_max_sessions_per_applet(mut self, max: usize) -> Self {
        self.max_sessions_per_applet = max;
        self
    }

    fn is_builtin(uuid: &AppletUuid) -> bool {
        matches!(uuid.as_str(), ECHO_APPLET_UUID | EVENT_SERVICE_APPLET_UUID)
    }
}

#[async_trait]
impl VmPlugin for FakePlugin {
    fn vm_family(&self) -> VmFamily {
        self.vm_family
    }

    async fn get_plugin_type(&self) -> Result<(TransportKind, FwVersion), Status> {
        Ok((TransportKind::Emulation, FwVersion::new(13, 0, 0)))
    }

    async fn query_tee_metadata(&self) -> Result<Vec<u8>, Status> {
        if self.vm_family.is_bh_v2() {
            Ok(b"fake-tee-metadata".to_vec())
        } else {
            Err(Status::TeeInvalidParams)
        }
    }

    async fn download_applet(&self, uuid: &AppletUuid, blob: &[u8]) -> Result<(), Status> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.installed.get(uuid) {
            if existing == blob {
                return Err(Status::FileIdentical);
            }
        }
        inner.installed.insert(*uuid, blob.to_vec());
        Ok(())
    }

    async fn unload_applet(&self, uuid: &AppletUuid) -> Result<(), Status> {
        if Self::is_builtin(uuid) {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        if inner.installed.remove(uuid).is_none() {
            return Err(Status::AppletNotInstalled);
        }
        Ok(())
    }

    async fn parse_package(&self, _blob: &[u8]) -> Result<(), Status> {
        Ok(())
    }

    async fn create_session(&self, uuid: &AppletUuid, _init_buf: &[u8]) -> Result<VmHandle, Status> {
        let mut inner = self.inner.lock();
        if !Self::is_builtin(uuid) && !inner.installed.contains_key(uuid) {
            return Err(Status::AppletNotInstalled);
        }
        let open_count = inner.sessions.values().filter(|u| *u == uuid).count();
        if open_count >= self.max_sessions_per_applet {
            return Err(Status::MaxSessionsReached);
        }
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.sessions.insert(handle, *uuid);
        Ok(handle)
    }

    async fn close_session(&self, handle: VmHandle) -> Result<(), Status> {
        let mut inner = self.inner.lock();
        inner.sessions.remove(&handle).map(|_| ()).ok_or(Status::InvalidHandle)
    }

    async fn force_close_session(&self, handle: VmHandle) -> Result<(), Status> {
        self.close_session(handle).await
    }

    async fn send_and_recv(
        &self,
        handle: VmHandle,
        cmd_id: u32,
        tx: &[u8],
        _rx_len: u32,
    ) -> Result<(Vec<u8>, i32), Status> {
        let uuid = {
            let inner = self.inner.lock();
            *inner.sessions.get(&handle).ok_or(Status::InvalidHandle)?
        };

        if cmd_id == CMD_INFINITE_LOOP {
            self.inner.lock().sessions.remove(&handle);
            return Err(Status::AppletFatal);
        }

        if uuid.as_str() == EVENT_SERVICE_APPLET_UUID && cmd_id == CMD_EMIT_EVENT {
            let _ = self.event_tx.send(SpoolerEvent {
                target: handle,
                event: EventData::new(1, tx.to_vec()),
            });
            return Ok((Vec::new(), 0));
        }

        Ok((tx.to_vec(), tx.len() as i32))
    }

    async fn get_applet_property(&self, _uuid: &AppletUuid, tx: &[u8]) -> Result<Vec<u8>, Status> {
        Ok(tx.to_vec())
    }

    async fn wait_for_spooler_event(&self, _spooler_handle: VmHandle) -> Result<SpoolerEvent, Status> {
        // Blocking recv by design: callers run this on a dedicated thread
        // (spec §4.5, §5 "spooler listener wait_for_spooler_event").
        self.event_rx.lock().recv().map_err(|_| Status::ServiceUnavailable)
    }

    async fn open_sd_session(&self, sd_uuid: &AppletUuid) -> Result<VmHandle, Status> {
        if !self.vm_family.is_bh_v2() {
            return Err(Status::TeeInvalidParams);
        }
        let mut inner = self.inner.lock();
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.sd_sessions.insert(handle, *sd_uuid);
        Ok(handle)
    }

    async fn close_sd_session(&self, handle: VmHandle) -> Result<(), Status> {
        let mut inner = self.inner.lock();
        inner.sd_sessions.remove(&handle).map(|_| ()).ok_or(Status::TeeSdNotFound)
    }

    async fn send_cmd_pkg(&self, handle: VmHandle, _pkg: &[u8]) -> Result<(), Status> {
        let inner = self.inner.lock();
        if inner.sd_sessions.contains_key(&handle) {
            Ok(())
        } else {
            Err(Status::TeeSdNotFound)
        }
    }

    async fn list_installed_tas(&self, _sd_handle: VmHandle) -> Result<Vec<AppletUuid>, Status> {
        if !self.vm_family.is_bh_v2() {
            return Err(Status::TeeInvalidParams);
        }
        Ok(self.inner.lock().installed.keys().copied().collect())
    }

    async fn list_installed_sds(&self, _sd_handle: VmHandle) -> Result<Vec<AppletUuid>, Status> {
        if !self.vm_family.is_bh_v2() {
            return Err(Status::TeeInvalidParams);
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
