// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders and helpers shared across crates (gated behind
//! `test-support` so downstream crates can depend on them without pulling
//! them into release builds).

use crate::owner::{Owner, ProcessInfo};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A [`ProcessInfo`] backed by an in-memory table, for deterministic tests
/// of owner-death garbage collection.
#[derive(Clone, Default)]
pub struct FakeProcessInfo(Arc<Mutex<HashMap<u32, u64>>>);

impl FakeProcessInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a live process with the given start time.
    pub fn insert(&self, pid: u32, start_time: u64) {
        self.0.lock().insert(pid, start_time);
    }

    /// Simulate the process dying (pid no longer resolvable).
    pub fn kill(&self, pid: u32) {
        self.0.lock().remove(&pid);
    }
}

impl ProcessInfo for FakeProcessInfo {
    fn resolve(&self, pid: u32) -> Option<Owner> {
        self.0.lock().get(&pid).map(|&start_time| Owner::new(pid, start_time))
    }
}

#[cfg(feature = "proptest")]
pub mod strategies {
    use crate::ids::AppletUuid;
    use proptest::prelude::*;

    /// A proptest strategy generating valid 32-uppercase-hex applet UUIDs.
    pub fn applet_uuid() -> impl Strategy<Value = AppletUuid> {
        "[0-9A-F]{32}".prop_map(|s| AppletUuid::parse(&s).expect("generated valid hex"))
    }
}
