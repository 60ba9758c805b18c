// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

struct FakeProcessInfo(HashMap<u32, u64>);

impl ProcessInfo for FakeProcessInfo {
    fn resolve(&self, pid: u32) -> Option<Owner> {
        self.0.get(&pid).map(|&start_time| Owner::new(pid, start_time))
    }
}

#[test]
fn live_process_with_matching_start_time_is_not_dead() {
    let info = FakeProcessInfo(HashMap::from([(42, 100)]));
    assert!(!info.is_dead(&Owner::new(42, 100)));
}

#[test]
fn missing_process_is_dead() {
    let info = FakeProcessInfo(HashMap::new());
    assert!(info.is_dead(&Owner::new(42, 100)));
}

#[test]
fn pid_reused_by_different_process_is_dead() {
    // pid 42 exists again, but with a different start time: the original
    // owner process is gone even though the pid is "alive".
    let info = FakeProcessInfo(HashMap::from([(42, 999)]));
    assert!(info.is_dead(&Owner::new(42, 100)));
}

#[test]
fn system_process_info_sees_self_as_alive() {
    let info = SystemProcessInfo;
    let pid = std::process::id();
    // We don't know our own recorded start time without reading /proc
    // ourselves, but a bogus start time for our own live pid must still
    // be reported dead (start time mismatch), proving the check isn't a
    // pure existence check.
    assert!(info.is_dead(&Owner::new(pid, 0)));
}
