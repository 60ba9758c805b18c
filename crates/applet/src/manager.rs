// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Applet Manager (spec §4.2, C3): repository bookkeeping and the
//! install/uninstall state machine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dal_core::{AppletUuid, FwVersion, Platform, Status, SPOOLER_APPLET_UUID};
use dal_plugin::VmPlugin;
use parking_lot::Mutex;

use crate::package;
use crate::record::{AppletRecord, InstallState};

/// What C3 reports back for a UUID, distinct from the internal
/// [`InstallState`]: `NotInstalled` covers both "never seen" and "removed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppletStatus {
    NotInstalled,
    PendingInstall,
    Installed,
}

/// The applet manager's one collaboration point with the session manager
/// (C5), injected rather than depended on directly so `dal-applet` and
/// `dal-session` don't need to know about each other's internals.
pub trait SessionHousekeeping: Send + Sync {
    /// True if any session of `uuid` has owners and isn't shared (blocks a
    /// replacing install, spec §4.2 step 3).
    fn non_shared_sessions_exist(&self, uuid: &AppletUuid) -> bool;

    /// Evict one unused applet's session state to make room for an install
    /// (spec §4.2 step 6): zero-session applets first, then a
    /// shared-session-only applet whose session has no owners. Returns the
    /// evicted applet's UUID.
    fn evict_one_unused(&self) -> Option<AppletUuid>;
}

pub struct AppletManager<P: VmPlugin> {
    repository_dir: PathBuf,
    plugin: Arc<P>,
    housekeeping: Arc<dyn SessionHousekeeping>,
    records: Mutex<HashMap<AppletUuid, AppletRecord>>,
    running_platform: Platform,
    running_fw: FwVersion,
    running_api_level: u16,
}

fn pending_name(uuid: &AppletUuid, ext: &str) -> String {
    format!("PENDING-{}.{ext}", uuid.as_str())
}

fn final_name(uuid: &AppletUuid, ext: &str) -> String {
    format!("{}.{ext}", uuid.as_str())
}

fn extension_for(is_acp: bool) -> &'static str {
    if is_acp {
        "acp"
    } else {
        "dalp"
    }
}

fn extension_matches(path: &Path, is_acp: bool) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension_for(is_acp)))
}

fn is_public_uuid(uuid: &AppletUuid) -> bool {
    uuid.as_str() != SPOOLER_APPLET_UUID
}

fn looks_like_dalp(bytes: &[u8]) -> bool {
    let trimmed = bytes.iter().position(|b| !b.is_ascii_whitespace()).map(|i| &bytes[i..]).unwrap_or(bytes);
    trimmed.starts_with(b"<?xml") || trimmed.starts_with(b"<package")
}

impl<P: VmPlugin> AppletManager<P> {
    pub fn new(
        repository_dir: PathBuf,
        plugin: Arc<P>,
        housekeeping: Arc<dyn SessionHousekeeping>,
        running_platform: Platform,
        running_fw: FwVersion,
        running_api_level: u16,
    ) -> Self {
        Self {
            repository_dir,
            plugin,
            housekeeping,
            records: Mutex::new(HashMap::new()),
            running_platform,
            running_fw,
            running_api_level,
        }
    }

    /// Populate the in-memory record table from whatever is already on disk.
    /// A leftover `PENDING-*` file means the daemon crashed mid-install; it
    /// never reached the VM successfully, so it's simply discarded.
    pub fn scan_repository(&self) -> std::io::Result<()> {
        let mut records = self.records.lock();
        for entry in std::fs::read_dir(&self.repository_dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else { continue };

            if file_name.starts_with("PENDING-") {
                tracing::warn!(path = %path.display(), "discarding leftover pending install");
                let _ = std::fs::remove_file(&path);
                continue;
            }

            let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
            let is_acp = match ext {
                "acp" => true,
                "dalp" => false,
                _ => continue,
            };
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
            let Ok(uuid) = AppletUuid::parse(stem) else { continue };

            records.insert(uuid, AppletRecord { uuid, path, is_acp, visible: true, state: InstallState::Installed });
        }
        Ok(())
    }

    pub fn get_applet_state(&self, uuid: &AppletUuid) -> AppletStatus {
        match self.records.lock().get(uuid).map(|r| r.state) {
            Some(InstallState::Installed) => AppletStatus::Installed,
            Some(InstallState::PendingInstall) => AppletStatus::PendingInstall,
            None => AppletStatus::NotInstalled,
        }
    }

    pub fn applet_exists_in_repo(&self, uuid: &AppletUuid) -> Option<(PathBuf, bool)> {
        self.records.lock().get(uuid).map(|r| (r.path.clone(), r.is_acp))
    }

    pub fn installed_uuids(&self, include_hidden: bool) -> Vec<AppletUuid> {
        self.records
            .lock()
            .values()
            .filter(|r| r.state == InstallState::Installed && (include_hidden || r.visible))
            .map(|r| r.uuid)
            .collect()
    }

    pub fn get_applet_blobs(&self, path: &Path, is_acp: bool) -> Result<Vec<Vec<u8>>, Status> {
        let bytes = std::fs::read(path).map_err(|_| Status::FileNotFound)?;
        if is_acp {
            Ok(vec![bytes])
        } else {
            package::select_blobs(&bytes, self.running_platform, self.running_fw, self.running_api_level)
        }
    }

    /// Whether `uuid` can be used in a shared session. The plugin ABI has no
    /// per-applet capability query, so this consults only the VM family:
    /// shared sessions are a BH_V2 VM feature (spec §4.4 shared-session
    /// coalescing).
    pub fn is_shared_session_supported(&self, _uuid: &AppletUuid) -> bool {
        self.plugin.vm_family().is_bh_v2()
    }

    pub async fn install(&self, uuid: &AppletUuid, file_path: &Path, visible: bool, is_acp: bool) -> Status {
        if !is_public_uuid(uuid) {
            return Status::InvalidAppletGuid;
        }
        if !extension_matches(file_path, is_acp) {
            return Status::FileInvalid;
        }
        if self.housekeeping.non_shared_sessions_exist(uuid) {
            return Status::InstallFailureSessionsExist;
        }

        let bytes = match std::fs::read(file_path) {
            Ok(b) => b,
            Err(_) => return Status::FileNotFound,
        };
        self.install_bytes(uuid, &bytes, visible, is_acp).await
    }

    pub async fn install_from_buffer(&self, uuid: &AppletUuid, bytes: &[u8]) -> Status {
        if !is_public_uuid(uuid) {
            return Status::InvalidAppletGuid;
        }
        if self.housekeeping.non_shared_sessions_exist(uuid) {
            return Status::InstallFailureSessionsExist;
        }
        let is_acp = !looks_like_dalp(bytes);
        self.install_bytes(uuid, bytes, true, is_acp).await
    }

    /// Silently install the reserved spooler applet (spec §4.5), bypassing
    /// the public-UUID check `install`/`install_from_buffer` apply and
    /// marking the record hidden from user-facing listings.
    pub async fn install_spooler(&self, uuid: &AppletUuid, bytes: &[u8]) -> Status {
        let is_acp = !looks_like_dalp(bytes);
        self.install_bytes(uuid, bytes, false, is_acp).await
    }

    async fn install_bytes(&self, uuid: &AppletUuid, bytes: &[u8], visible: bool, is_acp: bool) -> Status {
        let ext = extension_for(is_acp);
        let pending_path = self.repository_dir.join(pending_name(uuid, ext));

        if std::fs::write(&pending_path, bytes).is_err() {
            return Status::FileErrorCopy;
        }
        self.records.lock().insert(
            *uuid,
            AppletRecord { uuid: *uuid, path: pending_path.clone(), is_acp, visible, state: InstallState::PendingInstall },
        );

        let candidates = if is_acp {
            vec![bytes.to_vec()]
        } else {
            match package::select_blobs(bytes, self.running_platform, self.running_fw, self.running_api_level) {
                Ok(c) if !c.is_empty() => c,
                Ok(_) => {
                    self.rollback_pending(uuid).await;
                    return Status::FileInvalid;
                }
                Err(status) => {
                    self.rollback_pending(uuid).await;
                    return status;
                }
            }
        };

        let mut retried_identical = false;
        let mut retried_evict = false;
        let mut idx = 0;

        while idx < candidates.len() {
            match self.plugin.download_applet(uuid, &candidates[idx]).await {
                Ok(()) => {
                    return match self.finalize_install(uuid, &pending_path, ext, visible) {
                        Ok(()) => Status::Success,
                        Err(_) => Status::ErrorRegistry,
                    };
                }
                // Retry the same candidate once after unloading the stale
                // copy; a second FILE_IDENTICAL is terminal.
                Err(Status::FileIdentical) if !retried_identical => {
                    retried_identical = true;
                    let _ = self.plugin.unload_applet(uuid).await;
                    continue;
                }
                Err(Status::FileIdentical) => {
                    self.rollback_pending(uuid).await;
                    return Status::InstallFailed;
                }
                // Evict one unused applet and re-try every candidate from
                // the top, since eviction may free room for a blob an
                // earlier candidate in the list already failed on.
                Err(Status::MaxInstalledAppletsReached) if !retried_evict => {
                    retried_evict = true;
                    if !self.unload_one_unused().await {
                        self.rollback_pending(uuid).await;
                        return Status::MaxInstalledAppletsReached;
                    }
                    idx = 0;
                    continue;
                }
                Err(Status::MaxInstalledAppletsReached) => {
                    self.rollback_pending(uuid).await;
                    return Status::MaxInstalledAppletsReached;
                }
                // Any other per-candidate error: fall through to the next
                // candidate blob rather than failing the whole install.
                Err(_status) => {}
            }
            idx += 1;
        }

        self.rollback_pending(uuid).await;
        Status::InstallFailed
    }

    fn finalize_install(&self, uuid: &AppletUuid, pending_path: &Path, ext: &str, visible: bool) -> std::io::Result<()> {
        let final_path = self.repository_dir.join(final_name(uuid, ext));

        let other_ext = if ext == "acp" { "dalp" } else { "acp" };
        let _ = std::fs::remove_file(self.repository_dir.join(final_name(uuid, other_ext)));

        std::fs::rename(pending_path, &final_path)?;
        self.records.lock().insert(
            *uuid,
            AppletRecord { uuid: *uuid, path: final_path, is_acp: ext == "acp", visible, state: InstallState::Installed },
        );
        Ok(())
    }

    async fn rollback_pending(&self, uuid: &AppletUuid) {
        let pending_path = {
            let mut records = self.records.lock();
            match records.get(uuid) {
                Some(r) if r.state == InstallState::PendingInstall => {
                    let path = r.path.clone();
                    records.remove(uuid);
                    Some(path)
                }
                _ => None,
            }
        };
        let _ = self.plugin.unload_applet(uuid).await;
        if let Some(path) = pending_path {
            let _ = std::fs::remove_file(path);
        }
    }

    pub async fn uninstall(&self, uuid: &AppletUuid) -> Status {
        if self.housekeeping.non_shared_sessions_exist(uuid) {
            return Status::InstallFailureSessionsExist;
        }
        let path = match self.records.lock().get(uuid) {
            Some(r) => r.path.clone(),
            None => return Status::AppletNotInstalled,
        };
        match self.plugin.unload_applet(uuid).await {
            Ok(()) | Err(Status::AppletNotInstalled) => {
                let _ = std::fs::remove_file(&path);
                self.records.lock().remove(uuid);
                Status::Success
            }
            Err(status) => status,
        }
    }

    /// Evict one unused applet's VM state and repository entry to make room
    /// (spec §4.2 step 6). Returns `false` if nothing was evictable.
    pub async fn unload_one_unused(&self) -> bool {
        let Some(uuid) = self.housekeeping.evict_one_unused() else { return false };
        let _ = self.plugin.unload_applet(&uuid).await;
        let path = self.records.lock().remove(&uuid).map(|r| r.path);
        if let Some(path) = path {
            let _ = std::fs::remove_file(path);
        }
        true
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
