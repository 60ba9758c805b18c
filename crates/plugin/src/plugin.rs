// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Plugin ABI (spec C1, §6 "Plugin ABI, abridged"): the daemon's only
//! window onto the coprocessor. Every method returns a [`Status`] on
//! failure rather than a library-specific error, matching spec §7's
//! propagation policy ("no exceptions cross subsystem boundaries; every
//! public method returns a status code").
//!
//! BH_V2-only methods default to [`Status::TeeInvalidParams`] so that
//! `TL`/`BH_V1` implementations only have to override the methods that make
//! sense for them.

use async_trait::async_trait;
use dal_core::{AppletUuid, FwVersion, Status, TransportKind, VmFamily};

use crate::types::{SpoolerEvent, VmHandle};

#[async_trait]
pub trait VmPlugin: Send + Sync + 'static {
    /// The VM generation this instance speaks to.
    fn vm_family(&self) -> VmFamily;

    /// Discover transport kind and firmware version (spec §4.1 step 1).
    async fn get_plugin_type(&self) -> Result<(TransportKind, FwVersion), Status>;

    /// BH_V2 TEE metadata blob (`QUERY_TEE_METADATA`).
    async fn query_tee_metadata(&self) -> Result<Vec<u8>, Status> {
        Err(Status::TeeInvalidParams)
    }

    /// Download one candidate applet blob into the VM.
    async fn download_applet(&self, uuid: &AppletUuid, blob: &[u8]) -> Result<(), Status>;

    async fn unload_applet(&self, uuid: &AppletUuid) -> Result<(), Status>;

    /// VM-side validation that a blob is a package format this VM accepts,
    /// ahead of `download_applet` (distinct from C4's XML entry selection,
    /// which runs before this is ever called).
    async fn parse_package(&self, blob: &[u8]) -> Result<(), Status>;

    async fn create_session(
        &self,
        uuid: &AppletUuid,
        init_buf: &[u8],
    ) -> Result<VmHandle, Status>;

    async fn close_session(&self, handle: VmHandle) -> Result<(), Status>;

    async fn force_close_session(&self, handle: VmHandle) -> Result<(), Status>;

    async fn send_and_recv(
        &self,
        handle: VmHandle,
        cmd_id: u32,
        tx: &[u8],
        rx_len: u32,
    ) -> Result<(Vec<u8>, i32), Status>;

    async fn get_applet_property(&self, uuid: &AppletUuid, tx: &[u8]) -> Result<Vec<u8>, Status>;

    /// Block until the spooler applet reports one event. Spec §4.5: runs on
    /// a dedicated blocking thread, never called from an async context
    /// directly.
    async fn wait_for_spooler_event(&self, spooler_handle: VmHandle)
        -> Result<SpoolerEvent, Status>;

    // --- BH_V2 only ---

    async fn open_sd_session(&self, _sd_uuid: &AppletUuid) -> Result<VmHandle, Status> {
        Err(Status::TeeInvalidParams)
    }

    async fn close_sd_session(&self, _handle: VmHandle) -> Result<(), Status> {
        Err(Status::TeeInvalidParams)
    }

    async fn send_cmd_pkg(&self, _handle: VmHandle, _pkg: &[u8]) -> Result<(), Status> {
        Err(Status::TeeInvalidParams)
    }

    async fn list_installed_tas(&self, _sd_handle: VmHandle) -> Result<Vec<AppletUuid>, Status> {
        Err(Status::TeeInvalidParams)
    }

    async fn list_installed_sds(&self, _sd_handle: VmHandle) -> Result<Vec<AppletUuid>, Status> {
        Err(Status::TeeInvalidParams)
    }
}
