// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! dal-engine: Globals & Lifecycle (C2), the Command Dispatcher (C6), and
//! the spooler event listener (spec §4.5) wired into one `Engine<P>` the
//! commands server (C8) drives one request at a time.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod dispatcher;
mod globals;
mod listener;
mod sd_sessions;

use std::path::PathBuf;
use std::sync::Arc;

use dal_core::Platform;
use dal_plugin::VmPlugin;
use dal_wire::{Request, Response};

pub use globals::Globals;
use sd_sessions::SdSessionTable;

/// Configuration the engine needs at construction; everything else (VM
/// family, transport kind, firmware version) is discovered from the plugin
/// during init (spec §4.1).
pub struct EngineConfig {
    pub repository_dir: PathBuf,
    pub spooler_applet_path: PathBuf,
    pub platform: Platform,
}

/// The daemon's single entry point for a decoded request. One instance is
/// shared across every commands-server connection.
pub struct Engine<P: VmPlugin> {
    globals: Arc<Globals<P>>,
    sd_sessions: SdSessionTable,
}

impl<P: VmPlugin> Engine<P> {
    pub fn new(plugin: Arc<P>, config: EngineConfig) -> Self {
        Self {
            globals: Globals::new(plugin, config.repository_dir, config.spooler_applet_path, config.platform),
            sd_sessions: SdSessionTable::new(),
        }
    }

    /// Route one request end to end: lazily initializes the service on a
    /// cold start (spec §4.1), then dispatches under the global mutex
    /// unless the command is `SEND_AND_RECEIVE` (spec §5 lock order #2).
    pub async fn handle_request(&self, request: Request) -> Response {
        let command_id = request.command_id();
        let state = match self.globals.acquire().await {
            Ok(state) => state,
            Err(status) => return Response::err(status),
        };

        if command_id.skips_global_mutex() {
            dispatcher::dispatch(&state, &self.sd_sessions, &state.plugin, request).await
        } else {
            let _guard = self.globals.global_mutex.lock().await;
            dispatcher::dispatch(&state, &self.sd_sessions, &state.plugin, request).await
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
