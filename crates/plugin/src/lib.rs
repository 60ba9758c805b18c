// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Plugin ABI: the daemon's interface onto a VM family running in the
//! secure coprocessor (spec §6 "Plugin ABI, abridged"). [`VmPlugin`] is the
//! trait every transport implements; [`HeciPlugin`] is the real,
//! HECI-backed implementation, and [`FakePlugin`] (behind `test-support`) is
//! an in-memory stand-in for tests.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod heci;
mod plugin;
mod types;

#[cfg(feature = "test-support")]
mod fake;

pub use heci::HeciPlugin;
pub use plugin::VmPlugin;
pub use types::{EventData, SpoolerEvent, VmHandle};

#[cfg(feature = "test-support")]
pub use fake::{FakePlugin, CMD_EMIT_EVENT, CMD_INFINITE_LOOP, ECHO_APPLET_UUID, EVENT_SERVICE_APPLET_UUID};
