// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The real, HECI-backed [`VmPlugin`]. Talks to the ME/CSE coprocessor
//! through the kernel MEI character device (`/dev/mei0`, falling back to
//! `/dev/mei`, per `libmei`'s `mei_default_device`). Opening the device is
//! the one piece of genuinely host-specific plumbing this service needs;
//! the ioctl-level MEI client protocol itself is out of scope here (spec
//! §9: the plugin ABI is an external interface, no concrete coprocessor
//! transport is implemented) — every VM operation on a device that isn't
//! present or isn't responding surfaces as `NO_CONNECTION_TO_FIRMWARE`.

use async_trait::async_trait;
use dal_core::{AppletUuid, FwVersion, Status, TransportKind, VmFamily};
use std::path::Path;

use crate::plugin::VmPlugin;
use crate::types::{SpoolerEvent, VmHandle};

const MEI_DEVICE_PATHS: [&str; 2] = ["/dev/mei0", "/dev/mei"];

/// `VmPlugin` implementation backed by the HECI/MEI transport.
pub struct HeciPlugin {
    vm_family: VmFamily,
    device: Option<std::fs::File>,
}

impl HeciPlugin {
    /// Open the MEI device for `vm_family`, trying each well-known devnode
    /// in turn. `device` is `None` (not an error) when no devnode exists —
    /// every subsequent call then reports `NO_CONNECTION_TO_FIRMWARE`,
    /// mirroring `jhis_init`'s "leave globals uninitialized" behavior
    /// (spec §4.1) rather than panicking at construction time.
    pub fn open(vm_family: VmFamily) -> Self {
        let device = MEI_DEVICE_PATHS.iter().map(Path::new).find_map(|p| std::fs::File::open(p).ok());
        if device.is_none() {
            tracing::warn!(devnodes = ?MEI_DEVICE_PATHS, "no MEI device found; plugin will report NO_CONNECTION_TO_FIRMWARE");
        }
        Self { vm_family, device }
    }

    fn require_device(&self) -> Result<&std::fs::File, Status> {
        self.device.as_ref().ok_or(Status::NoConnectionToFirmware)
    }
}

#[async_trait]
impl VmPlugin for HeciPlugin {
    fn vm_family(&self) -> VmFamily {
        self.vm_family
    }

    async fn get_plugin_type(&self) -> Result<(TransportKind, FwVersion), Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }

    async fn download_applet(&self, _uuid: &AppletUuid, _blob: &[u8]) -> Result<(), Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }

    async fn unload_applet(&self, _uuid: &AppletUuid) -> Result<(), Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }

    async fn parse_package(&self, _blob: &[u8]) -> Result<(), Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }

    async fn create_session(&self, _uuid: &AppletUuid, _init_buf: &[u8]) -> Result<VmHandle, Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }

    async fn close_session(&self, _handle: VmHandle) -> Result<(), Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }

    async fn force_close_session(&self, _handle: VmHandle) -> Result<(), Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }

    async fn send_and_recv(
        &self,
        _handle: VmHandle,
        _cmd_id: u32,
        _tx: &[u8],
        _rx_len: u32,
    ) -> Result<(Vec<u8>, i32), Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }

    async fn get_applet_property(&self, _uuid: &AppletUuid, _tx: &[u8]) -> Result<Vec<u8>, Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }

    async fn wait_for_spooler_event(&self, _spooler_handle: VmHandle) -> Result<SpoolerEvent, Status> {
        self.require_device()?;
        Err(Status::NoConnectionToFirmware)
    }
}

#[cfg(test)]
#[path = "heci_tests.rs"]
mod tests;
