// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host process identity used to detect crashed session owners.
//!
//! A session owner is `(pid, process_start_time)` (spec §3, §6 GLOSSARY
//! "Owner"). The start time disambiguates pid reuse: if the OS recycles a
//! pid for an unrelated process, the recorded start time will no longer
//! match, so the owner is still correctly treated as dead.

use std::fmt;

/// A host process identity attached to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Owner {
    pub pid: u32,
    /// Process start time, in whatever monotonic-ish unit the platform's
    /// process-info query reports (epoch ms of process start on Linux).
    pub start_time: u64,
}

impl Owner {
    pub fn new(pid: u32, start_time: u64) -> Self {
        Self { pid, start_time }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid={} start={}", self.pid, self.start_time)
    }
}

/// Resolves and checks liveness of host process identities.
///
/// A trait so the session manager and its tests don't depend on actually
/// walking `/proc`; production code uses [`SystemProcessInfo`].
pub trait ProcessInfo: Send + Sync + 'static {
    /// Resolve the `(pid, start_time)` identity of a connected peer.
    fn resolve(&self, pid: u32) -> Option<Owner>;

    /// A process is dead when its pid no longer exists, or its current
    /// start time no longer matches `owner.start_time` (spec §3).
    fn is_dead(&self, owner: &Owner) -> bool {
        match self.resolve(owner.pid) {
            Some(current) => current.start_time != owner.start_time,
            None => true,
        }
    }
}

/// Real process-liveness checks via `/proc` (Linux) through `nix`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessInfo;

impl ProcessInfo for SystemProcessInfo {
    fn resolve(&self, pid: u32) -> Option<Owner> {
        let start_time = read_proc_start_time(pid)?;
        Some(Owner::new(pid, start_time))
    }

    fn is_dead(&self, owner: &Owner) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // Signal 0 performs no-op permission/existence checks only.
        if kill(Pid::from_raw(owner.pid as i32), None).is_err() {
            return true;
        }
        match read_proc_start_time(owner.pid) {
            Some(current) => current != owner.start_time,
            None => true,
        }
    }
}

/// Reads the process start time (field 22 of `/proc/<pid>/stat`, in clock
/// ticks since boot) as a stable-enough proxy for "this is the same process
/// that opened the session, not a different one that reused the pid".
fn read_proc_start_time(pid: u32) -> Option<u64> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // Fields after the parenthesized comm name can themselves contain
    // spaces/parens, so split on the last ')' rather than by whitespace
    // from the start.
    let after_comm = stat.rsplit_once(')')?.1;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    // Field 22 overall is index 19 in `fields` (fields[0] is field 3: state).
    fields.get(19)?.parse().ok()
}

#[cfg(test)]
#[path = "owner_tests.rs"]
mod tests;
