// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized configuration loading for the daemon binary (spec §6
//! "Configuration"): applet repository path, spooler applet path, socket
//! path, and the VM family/platform the plugin talks to. Mirrors the
//! teacher's `lifecycle::Config`/`env.rs` split — fixed paths under one
//! state directory, overridable via environment variables.

use std::path::PathBuf;

use dal_core::{Platform, VmFamily};

use crate::error::DaemonError;

/// Default bound on in-flight clients (spec §4.7's counting semaphore).
const DEFAULT_MAX_CLIENTS: usize = 64;

/// Daemon configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. `~/.local/state/dal`).
    pub state_dir: PathBuf,
    /// Applet repository directory (C3).
    pub repository_dir: PathBuf,
    /// Path to the spooler applet's signed package on disk.
    pub spooler_applet_path: PathBuf,
    /// Path to the commands-server Unix socket.
    pub socket_path: PathBuf,
    /// Path to the daemon's own log file.
    pub log_path: PathBuf,
    /// VM family the plugin should talk to.
    pub vm_family: VmFamily,
    /// Coprocessor platform.
    pub platform: Platform,
    /// Ceiling on concurrently in-flight client connections.
    pub max_clients: usize,
}

impl Config {
    /// Resolve configuration for the user-level daemon.
    ///
    /// Uses fixed paths under `~/.local/state/dal` (or
    /// `$XDG_STATE_HOME/dal`), overridable with `DAL_STATE_DIR` and
    /// `DAL_SOCKET_PATH`.
    pub fn load() -> Result<Self, DaemonError> {
        let state_dir = state_dir()?;

        Ok(Self {
            repository_dir: state_dir.join("applets"),
            spooler_applet_path: state_dir.join("spooler.dalp"),
            socket_path: std::env::var("DAL_SOCKET_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| state_dir.join("dal.sock")),
            log_path: state_dir.join("dal.log"),
            vm_family: vm_family_from_env(),
            platform: platform_from_env(),
            max_clients: max_clients_from_env(),
            state_dir,
        })
    }
}

/// Resolve state directory: `DAL_STATE_DIR` > `XDG_STATE_HOME/dal` >
/// `~/.local/state/dal`.
fn state_dir() -> Result<PathBuf, DaemonError> {
    if let Ok(dir) = std::env::var("DAL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("dal"));
    }
    dirs::state_dir().or_else(dirs::home_dir).map(|home| home.join(".local/state/dal")).ok_or(DaemonError::NoStateDir)
}

fn vm_family_from_env() -> VmFamily {
    match std::env::var("DAL_VM_FAMILY").as_deref() {
        Ok("tl") => VmFamily::Tl,
        Ok("bh_v1") => VmFamily::BhV1,
        _ => VmFamily::BhV2,
    }
}

fn platform_from_env() -> Platform {
    match std::env::var("DAL_PLATFORM").as_deref() {
        Ok("sec") => Platform::Sec,
        Ok("cse") => Platform::Cse,
        _ => Platform::Me,
    }
}

fn max_clients_from_env() -> usize {
    std::env::var("DAL_MAX_CLIENTS").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_MAX_CLIENTS)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
