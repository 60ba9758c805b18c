// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Globals & Lifecycle (spec §4.1, C2): the `STOPPED ⇄ INITIALIZED` state
//! machine and the reader/writer lock that guards it.
//!
//! Subsystem singletons are owned here rather than kept as ambient statics:
//! [`Globals`] is constructed once in `main` and threaded into the commands
//! server and the spooler listener (spec §9 "Global mutable state").

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use dal_applet::{AppletManager, AppletStatus, SessionHousekeeping};
use dal_core::{AppletUuid, FwVersion, Owner, Platform, SessionId, Status, SystemClock, SystemProcessInfo, TransportKind, SPOOLER_APPLET_UUID};
use dal_plugin::VmPlugin;
use dal_session::SessionManager;

use crate::listener;

/// Everything that exists only while the service is `INITIALIZED`.
pub struct InitializedState<P: VmPlugin> {
    pub plugin: Arc<P>,
    pub applets: Arc<AppletManager<P>>,
    pub sessions: Arc<SessionManager<P>>,
    pub transport_kind: TransportKind,
    pub fw_version: FwVersion,
    pub platform: Platform,
    pub running_api_level: u16,
    pub spooler_session: SessionId,
    listener: tokio::task::JoinHandle<()>,
}

/// Borrowed access to the initialized state, returned by [`Globals::acquire`].
/// Holds either the reader lock (the common case) or, on a cold start, the
/// writer lock for the whole first command — `tokio::sync::RwLock` has no
/// safe read/write downgrade, so this is a deliberate simplification of
/// "init under the writer lock, then downgrade to reader for the command".
pub enum StateGuard<'a, P: VmPlugin> {
    Read(tokio::sync::RwLockReadGuard<'a, Option<InitializedState<P>>>),
    Write(tokio::sync::RwLockWriteGuard<'a, Option<InitializedState<P>>>),
}

impl<P: VmPlugin> Deref for StateGuard<'_, P> {
    type Target = InitializedState<P>;

    fn deref(&self) -> &InitializedState<P> {
        let slot = match self {
            StateGuard::Read(g) => g.as_ref(),
            StateGuard::Write(g) => g.as_ref(),
        };
        slot.expect("acquire() only returns a guard once state is populated")
    }
}

/// The `STOPPED ⇄ INITIALIZED` state machine plus the command-serializing
/// global mutex (spec §5 lock order #1 and #2). `STOPPING` is represented
/// implicitly by holding the writer lock while tearing down in
/// [`Globals::global_reset`].
pub struct Globals<P: VmPlugin> {
    plugin: Arc<P>,
    repository_dir: PathBuf,
    spooler_applet_path: PathBuf,
    platform: Platform,
    state: tokio::sync::RwLock<Option<InitializedState<P>>>,
    /// Spec §5 lock #2: serializes every command except `SEND_AND_RECEIVE`.
    pub global_mutex: tokio::sync::Mutex<()>,
    reset_complete: tokio::sync::Notify,
}

impl<P: VmPlugin> Globals<P> {
    pub fn new(plugin: Arc<P>, repository_dir: PathBuf, spooler_applet_path: PathBuf, platform: Platform) -> Arc<Self> {
        Arc::new(Self {
            plugin,
            repository_dir,
            spooler_applet_path,
            platform,
            state: tokio::sync::RwLock::new(None),
            global_mutex: tokio::sync::Mutex::new(()),
            reset_complete: tokio::sync::Notify::new(),
        })
    }

    pub fn plugin(&self) -> &Arc<P> {
        &self.plugin
    }

    /// Reader-locks the state, running the init algorithm (spec §4.1) first
    /// if the service is still `STOPPED`.
    pub async fn acquire(self: &Arc<Self>) -> Result<StateGuard<'_, P>, Status> {
        {
            let guard = self.state.read().await;
            if guard.is_some() {
                return Ok(StateGuard::Read(guard));
            }
        }

        let mut guard = self.state.write().await;
        if guard.is_none() {
            self.init_locked(&mut guard).await?;
        }
        Ok(StateGuard::Write(guard))
    }

    /// Step-by-step init algorithm (spec §4.1): discover the transport and
    /// firmware version, scan the applet repository, then bootstrap the
    /// spooler applet and its session and start the event listener. Any
    /// failure leaves `state` at `None` (STOPPED) and is reported as
    /// `SERVICE_UNAVAILABLE` to the caller.
    async fn init_locked(self: &Arc<Self>, guard: &mut tokio::sync::RwLockWriteGuard<'_, Option<InitializedState<P>>>) -> Result<(), Status> {
        let (transport_kind, fw_version) =
            self.plugin.get_plugin_type().await.map_err(|_| Status::ServiceUnavailable)?;
        // The plugin ABI has no dedicated "API level" query; the sign-once
        // package-selection level (spec §4.3) is the running firmware's
        // minor version, already carried by `get_plugin_type`.
        let running_api_level = fw_version.minor;

        let sessions = Arc::new(SessionManager::new(self.plugin.clone(), SystemClock::default(), SystemProcessInfo));
        let applets = Arc::new(AppletManager::new(
            self.repository_dir.clone(),
            self.plugin.clone(),
            sessions.clone() as Arc<dyn SessionHousekeeping>,
            self.platform,
            fw_version,
            running_api_level,
        ));
        applets.scan_repository().map_err(|_| Status::ServiceUnavailable)?;

        let spooler_uuid = AppletUuid::parse(SPOOLER_APPLET_UUID).expect("reserved uuid is well-formed");
        let (spooler_session, listener_handle) =
            bootstrap_spooler(&self.plugin, &applets, &sessions, &self.spooler_applet_path, &spooler_uuid, self.clone()).await?;

        **guard = Some(InitializedState {
            plugin: self.plugin.clone(),
            applets,
            sessions,
            transport_kind,
            fw_version,
            platform: self.platform,
            running_api_level,
            spooler_session,
            listener: listener_handle,
        });
        Ok(())
    }

    /// Called by the spooler listener (spec §4.5) when the spooler session
    /// becomes unrecoverable: best-effort closes every VM session, drops our
    /// handle on the applet/session tables, returns to `STOPPED`, and wakes
    /// anyone waiting on [`Globals::wait_for_reset_complete`].
    pub async fn global_reset(&self) {
        let mut guard = self.state.write().await;
        if let Some(state) = guard.take() {
            state.sessions.close_all_in_vm().await;
            state.listener.abort();
        }
        self.reset_complete.notify_waiters();
    }

    pub async fn wait_for_reset_complete(&self) {
        self.reset_complete.notified().await;
    }

    pub(crate) fn spooler_applet_path(&self) -> &PathBuf {
        &self.spooler_applet_path
    }
}

/// Installs the spooler applet if it isn't already in the repository,
/// creates its session, and spawns the listener loop (spec §4.5).
async fn bootstrap_spooler<P: VmPlugin>(
    plugin: &Arc<P>,
    applets: &Arc<AppletManager<P>>,
    sessions: &Arc<SessionManager<P>>,
    spooler_applet_path: &PathBuf,
    spooler_uuid: &AppletUuid,
    globals: Arc<Globals<P>>,
) -> Result<(SessionId, tokio::task::JoinHandle<()>), Status> {
    if applets.get_applet_state(spooler_uuid) == AppletStatus::NotInstalled {
        let bytes = std::fs::read(spooler_applet_path).map_err(|_| Status::ServiceUnavailable)?;
        let status = applets.install_spooler(spooler_uuid, &bytes).await;
        if status != Status::Success {
            return Err(status);
        }
    }

    // The spooler session belongs to the daemon itself, not to any host
    // client; owner pid/start_time 0 marks that.
    let spooler_owner = Owner::new(0, 0);
    let spooler_session = sessions
        .create_session(*spooler_uuid, 0, false, &[], spooler_owner, false)
        .await
        .map_err(|_| Status::ServiceUnavailable)?;
    let spooler_vm_handle = sessions.get_vm_handle(spooler_session).ok_or(Status::ServiceUnavailable)?;

    let listener_handle = listener::spawn(plugin.clone(), globals, applets.clone(), sessions.clone(), spooler_vm_handle, *spooler_uuid);
    Ok((spooler_session, listener_handle))
}

#[cfg(test)]
#[path = "globals_tests.rs"]
mod tests;
