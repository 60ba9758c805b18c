// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The spooler event listener (spec §4.5): a single background task per
//! `INITIALIZED` generation that blocks on the spooler applet's event queue
//! and fans events out to whichever session registered an OS event handle.

use std::sync::Arc;

use dal_applet::AppletManager;
use dal_core::{AppletUuid, Owner, Status};
use dal_plugin::VmHandle;
use dal_plugin::VmPlugin;
use dal_session::SessionManager;

use crate::globals::Globals;

/// Spawn the listener loop for one `INITIALIZED` generation. The returned
/// handle is stored in [`crate::globals::InitializedState`] and aborted by
/// [`Globals::global_reset`].
pub fn spawn<P: VmPlugin>(
    plugin: Arc<P>,
    globals: Arc<Globals<P>>,
    applets: Arc<AppletManager<P>>,
    sessions: Arc<SessionManager<P>>,
    spooler_vm_handle: VmHandle,
    spooler_uuid: AppletUuid,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(plugin, globals, applets, sessions, spooler_vm_handle, spooler_uuid))
}

async fn run<P: VmPlugin>(
    plugin: Arc<P>,
    globals: Arc<Globals<P>>,
    applets: Arc<AppletManager<P>>,
    sessions: Arc<SessionManager<P>>,
    mut spooler_vm_handle: VmHandle,
    spooler_uuid: AppletUuid,
) {
    loop {
        // `wait_for_spooler_event` blocks synchronously inside its async
        // body (spec §4.5: "never called from an async context directly").
        // `spawn_blocking` runs it on tokio's dedicated blocking pool so it
        // never occupies a worker thread needed by other commands.
        let wait_result = {
            let plugin = plugin.clone();
            tokio::task::spawn_blocking(move || tokio::runtime::Handle::current().block_on(plugin.wait_for_spooler_event(spooler_vm_handle)))
                .await
                .unwrap_or(Err(Status::ServiceUnavailable))
        };
        match wait_result {
            Ok(spooler_event) => {
                let Some(target) = sessions.session_id_for_vm_handle(spooler_event.target) else {
                    tracing::debug!(vm_handle = spooler_event.target, "spooler event for an unknown session, dropping");
                    continue;
                };
                if sessions.has_event_sink(target) {
                    sessions.enqueue_event(target, spooler_event.event);
                }
            }
            Err(Status::AppletFatal) => match reinstall_spooler(&plugin, &applets, &sessions, &globals, &spooler_uuid).await {
                Some(new_handle) => spooler_vm_handle = new_handle,
                None => {
                    tracing::warn!("spooler applet unrecoverable, resetting service");
                    globals.global_reset().await;
                    return;
                }
            },
            Err(status) => {
                tracing::warn!(%status, "spooler event wait failed, resetting service");
                globals.global_reset().await;
                return;
            }
        }
    }
}

/// Best-effort recovery: unload and reinstall the spooler applet, then open
/// a fresh session. `None` means recovery failed and the caller should reset.
async fn reinstall_spooler<P: VmPlugin>(
    plugin: &Arc<P>,
    applets: &Arc<AppletManager<P>>,
    sessions: &Arc<SessionManager<P>>,
    globals: &Arc<Globals<P>>,
    spooler_uuid: &AppletUuid,
) -> Option<VmHandle> {
    let bytes = std::fs::read(globals.spooler_applet_path()).ok()?;
    let _ = plugin.unload_applet(spooler_uuid).await;
    if applets.install_spooler(spooler_uuid, &bytes).await != Status::Success {
        return None;
    }
    let spooler_owner = Owner::new(0, 0);
    let session_id = sessions.create_session(*spooler_uuid, 0, false, &[], spooler_owner, false).await.ok()?;
    sessions.get_vm_handle(session_id)
}
