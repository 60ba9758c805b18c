// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event handle registration (spec §4.5 `set_session_event_handler`): the
//! named OS event a client registers so it can block on a single handle
//! instead of polling `GET_EVENT_DATA`.

use std::fs::File;
use std::io::Write;

use dal_core::Status;

/// Something that can be signaled when a session's event queue gains an
/// entry. A trait so tests don't need a real file descriptor.
pub trait EventSink: Send + Sync {
    fn signal(&self);
}

/// The real sink: `handle_name` is the decimal string form of an eventfd
/// the client already owns (handed to this process out-of-band, e.g. via
/// `SCM_RIGHTS` on the same connection) — the original service's
/// handle-by-fd-number convention on Linux. `open` takes its own handle on
/// that descriptor by reopening `/proc/self/fd/<n>` rather than `dup`ing it,
/// so no unsafe fd-ownership juggling is needed. Signaling writes the
/// eventfd increment protocol (8 bytes, counter += value).
pub struct OsEventSink {
    file: File,
}

impl OsEventSink {
    pub fn open(handle_name: &str) -> Result<Self, Status> {
        let raw: i32 = handle_name.parse().map_err(|_| Status::InvalidParams)?;
        let file = File::open(format!("/proc/self/fd/{raw}")).map_err(|_| Status::InvalidParams)?;
        Ok(Self { file })
    }
}

impl EventSink for OsEventSink {
    fn signal(&self) {
        let increment: u64 = 1;
        if let Err(err) = (&self.file).write_all(&increment.to_ne_bytes()) {
            tracing::warn!(%err, "failed to signal session event handle");
        }
    }
}

#[cfg(test)]
#[path = "event_sink_tests.rs"]
mod tests;
