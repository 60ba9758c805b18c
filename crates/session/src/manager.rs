// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Session Manager (spec §4.4, C5): the session table, owner
//! bookkeeping, shared-session coalescing, and the close-session decision
//! tree.

use std::collections::HashMap;
use std::sync::Arc;

use dal_applet::SessionHousekeeping;
use dal_core::{AppletUuid, Clock, Owner, ProcessInfo, SessionId, Status, SystemClock, SystemProcessInfo};
use dal_plugin::{EventData, VmHandle, VmPlugin};
use parking_lot::Mutex;

use crate::event_sink::{EventSink, OsEventSink};
use crate::record::SessionRecord;

/// Held across a VM `SEND_AND_RECEIVE` call or a session removal, per spec
/// §5 lock order #4. Freed atomically with record removal: [`SessionManager::remove`]
/// deletes both the record and the lock entry under the same table lock.
pub struct SessionGuard {
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

struct Inner {
    sessions: HashMap<SessionId, SessionRecord>,
    locks: HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>,
    by_vm_handle: HashMap<VmHandle, SessionId>,
    shared_by_uuid: HashMap<AppletUuid, SessionId>,
}

pub struct SessionManager<P: VmPlugin, C: Clock = SystemClock, PI: ProcessInfo = SystemProcessInfo> {
    plugin: Arc<P>,
    clock: C,
    process_info: PI,
    inner: Mutex<Inner>,
}

impl<P: VmPlugin, C: Clock, PI: ProcessInfo> SessionManager<P, C, PI> {
    pub fn new(plugin: Arc<P>, clock: C, process_info: PI) -> Self {
        Self {
            plugin,
            clock,
            process_info,
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                locks: HashMap::new(),
                by_vm_handle: HashMap::new(),
                shared_by_uuid: HashMap::new(),
            }),
        }
    }

    pub fn add(&self, uuid: AppletUuid, vm_handle: VmHandle, session_id: SessionId, flags: u32, shared: bool, owner: Owner) -> bool {
        let mut inner = self.inner.lock();
        if inner.sessions.contains_key(&session_id) {
            return false;
        }
        let now = self.clock.tick();
        inner.locks.insert(session_id, Arc::new(tokio::sync::Mutex::new(())));
        inner.by_vm_handle.insert(vm_handle, session_id);
        if shared {
            inner.shared_by_uuid.insert(uuid, session_id);
        }
        inner.sessions.insert(session_id, SessionRecord::new(session_id, vm_handle, uuid, flags, shared, owner, now));
        true
    }

    pub fn remove(&self, session_id: SessionId) -> bool {
        let mut inner = self.inner.lock();
        let Some(record) = inner.sessions.remove(&session_id) else { return false };
        inner.locks.remove(&session_id);
        inner.by_vm_handle.remove(&record.vm_handle);
        if inner.shared_by_uuid.get(&record.uuid) == Some(&session_id) {
            inner.shared_by_uuid.remove(&record.uuid);
        }
        true
    }

    pub fn get_vm_handle(&self, session_id: SessionId) -> Option<VmHandle> {
        self.inner.lock().sessions.get(&session_id).map(|r| r.vm_handle)
    }

    pub fn session_id_for_vm_handle(&self, vm_handle: VmHandle) -> Option<SessionId> {
        self.inner.lock().by_vm_handle.get(&vm_handle).copied()
    }

    pub fn session_flags(&self, session_id: SessionId) -> Option<u32> {
        self.inner.lock().sessions.get(&session_id).map(|r| r.flags)
    }

    pub fn sessions_count(&self, uuid: &AppletUuid) -> u32 {
        self.inner.lock().sessions.values().filter(|r| &r.uuid == uuid).count() as u32
    }

    pub fn add_owner(&self, session_id: SessionId, owner: Owner) -> bool {
        self.inner.lock().sessions.get_mut(&session_id).map(|r| r.add_owner(owner)).unwrap_or(false)
    }

    pub fn remove_owner(&self, session_id: SessionId, owner: &Owner) -> bool {
        let mut inner = self.inner.lock();
        let Some(record) = inner.sessions.get_mut(&session_id) else { return false };
        let removed = record.remove_owner(owner);
        if removed && record.owners.is_empty() && record.shared {
            record.last_used_tick = self.clock.tick();
        }
        removed
    }

    pub fn is_owner_valid(&self, session_id: SessionId, owner: &Owner) -> bool {
        self.inner.lock().sessions.get(&session_id).map(|r| r.is_owner_valid(owner)).unwrap_or(false)
    }

    pub fn owners_count(&self, session_id: SessionId) -> Option<usize> {
        self.inner.lock().sessions.get(&session_id).map(|r| r.owners.len())
    }

    pub fn get_shared_session(&self, uuid: &AppletUuid) -> Option<SessionId> {
        self.inner.lock().shared_by_uuid.get(uuid).copied()
    }

    pub fn set_event_sink(&self, session_id: SessionId, sink: Option<Box<dyn EventSink>>) -> bool {
        let mut inner = self.inner.lock();
        let Some(record) = inner.sessions.get_mut(&session_id) else { return false };
        record.event_sink = sink;
        if record.event_sink.is_none() {
            record.event_queue.clear();
        }
        true
    }

    /// `handle_name` empty unregisters (I6: shared sessions reject this
    /// outright rather than silently no-opping).
    pub fn set_session_event_handler(&self, session_id: SessionId, handle_name: &str) -> Status {
        let shared = match self.inner.lock().sessions.get(&session_id) {
            Some(r) => r.shared,
            None => return Status::InvalidSessionHandle,
        };
        if shared {
            return Status::EventsNotSupported;
        }
        if handle_name.is_empty() {
            self.set_event_sink(session_id, None);
            return Status::Success;
        }
        match OsEventSink::open(handle_name) {
            Ok(sink) => {
                self.set_event_sink(session_id, Some(Box::new(sink)));
                Status::Success
            }
            Err(status) => status,
        }
    }

    pub fn has_event_sink(&self, session_id: SessionId) -> bool {
        self.inner.lock().sessions.get(&session_id).is_some_and(|r| r.event_sink.is_some())
    }

    pub fn enqueue_event(&self, session_id: SessionId, event: EventData) -> bool {
        let mut inner = self.inner.lock();
        let Some(record) = inner.sessions.get_mut(&session_id) else { return false };
        if !record.enqueue_event(event) {
            return false;
        }
        if let Some(sink) = &record.event_sink {
            sink.signal();
        }
        true
    }

    pub fn get_event_data(&self, session_id: SessionId) -> Result<EventData, Status> {
        let mut inner = self.inner.lock();
        let Some(record) = inner.sessions.get_mut(&session_id) else { return Err(Status::InvalidSessionHandle) };
        if let Some(event) = record.dequeue_event() {
            return Ok(event);
        }
        if record.event_sink.is_some() {
            Err(Status::NoEvents)
        } else {
            Err(Status::SessionNotRegistered)
        }
    }

    pub async fn acquire_session_lock(&self, session_id: SessionId) -> Option<SessionGuard> {
        let lock = self.inner.lock().locks.get(&session_id).cloned()?;
        Some(SessionGuard { _guard: lock.lock_owned().await })
    }

    pub fn clear_dead_owners(&self) -> bool {
        let mut changed = false;
        let mut inner = self.inner.lock();
        let now = self.clock.tick();
        for record in inner.sessions.values_mut() {
            let before = record.owners.len();
            record.owners.retain(|o| !self.process_info.is_dead(o));
            if record.owners.len() != before {
                changed = true;
                if record.owners.is_empty() && record.shared {
                    record.last_used_tick = now;
                }
            }
        }
        changed
    }

    pub async fn clear_abandoned_non_shared(&self) -> bool {
        let targets: Vec<SessionId> = {
            let inner = self.inner.lock();
            inner.sessions.iter().filter(|(_, r)| !r.shared && r.owners.is_empty()).map(|(id, _)| *id).collect()
        };
        let mut any = false;
        for session_id in targets {
            if self.close_session(session_id, None, false).await == Status::Success {
                any = true;
            }
        }
        any
    }

    /// LRU over shared, ownerless sessions; actually closes the VM-side
    /// session (unlike [`SessionHousekeeping::evict_one_unused`], which only
    /// picks a candidate for the applet manager to unload).
    pub async fn try_remove_unused_shared(&self, _allow_if_has_non_shared: bool) -> bool {
        let candidate = {
            let inner = self.inner.lock();
            inner
                .sessions
                .iter()
                .filter(|(_, r)| r.shared && r.owners.is_empty())
                .min_by_key(|(_, r)| r.last_used_tick)
                .map(|(id, r)| (*id, r.vm_handle))
        };
        let Some((session_id, vm_handle)) = candidate else { return false };
        let _ = self.plugin.force_close_session(vm_handle).await;
        self.remove(session_id)
    }

    pub async fn close_all_in_vm(&self) {
        let targets: Vec<(SessionId, VmHandle)> = {
            let inner = self.inner.lock();
            inner.sessions.iter().map(|(id, r)| (*id, r.vm_handle)).collect()
        };
        for (session_id, vm_handle) in targets {
            let _ = self.plugin.force_close_session(vm_handle).await;
            self.remove(session_id);
        }
    }

    /// Shared-session coalescing + create-session retry discipline (spec
    /// §4.4).
    pub async fn create_session(
        &self,
        uuid: AppletUuid,
        flags: u32,
        shared: bool,
        init_buf: &[u8],
        owner: Owner,
        applet_supports_shared: bool,
    ) -> Result<SessionId, Status> {
        if shared {
            if !self.plugin.vm_family().is_bh_v2() && !applet_supports_shared {
                return Err(Status::SharedSessionNotSupported);
            }
            if let Some(existing) = self.get_shared_session(&uuid) {
                return if self.add_owner(existing, owner) { Ok(existing) } else { Err(Status::MaxSharedSessionReached) };
            }
        }

        let mut retried_evict = false;
        loop {
            match self.plugin.create_session(&uuid, init_buf).await {
                Ok(vm_handle) => {
                    let session_id = SessionId::new();
                    self.add(uuid, vm_handle, session_id, flags, shared, owner);
                    return Ok(session_id);
                }
                Err(status @ (Status::MaxSessionsReached | Status::MaxInstalledAppletsReached)) if !retried_evict => {
                    retried_evict = true;
                    if !self.try_remove_unused_shared(true).await {
                        return Err(status);
                    }
                }
                Err(status) => return Err(status),
            }
        }
    }

    /// Close-session decision tree (spec §4.4).
    pub async fn close_session(&self, session_id: SessionId, owner: Option<Owner>, force: bool) -> Status {
        let mut remove_session = owner.is_none();

        if let Some(owner) = owner {
            let mut inner = self.inner.lock();
            let Some(record) = inner.sessions.get_mut(&session_id) else { return Status::InvalidSessionHandle };
            if !record.is_owner_valid(&owner) {
                return Status::InvalidParams;
            }
            if record.owners.len() == 1 && !record.shared {
                remove_session = true;
            } else {
                record.remove_owner(&owner);
                if record.owners.is_empty() && record.shared {
                    record.last_used_tick = self.clock.tick();
                }
                return Status::Success;
            }
        }

        debug_assert!(remove_session);

        let vm_handle = match self.inner.lock().sessions.get(&session_id) {
            Some(r) => r.vm_handle,
            None => return Status::InvalidSessionHandle,
        };

        let _guard = if force {
            None
        } else {
            match self.acquire_session_lock(session_id).await {
                Some(guard) => Some(guard),
                None => return Status::InvalidSessionHandle,
            }
        };

        let result = if force { self.plugin.force_close_session(vm_handle).await } else { self.plugin.close_session(vm_handle).await };

        match result {
            Ok(()) | Err(Status::AppletFatal) => {
                self.remove(session_id);
                Status::Success
            }
            Err(status) => status,
        }
    }
}

impl<P: VmPlugin, C: Clock, PI: ProcessInfo> SessionHousekeeping for SessionManager<P, C, PI> {
    fn non_shared_sessions_exist(&self, uuid: &AppletUuid) -> bool {
        self.inner.lock().sessions.values().any(|r| &r.uuid == uuid && !r.shared && !r.owners.is_empty())
    }

    fn evict_one_unused(&self) -> Option<AppletUuid> {
        let mut inner = self.inner.lock();
        let candidate = inner
            .sessions
            .iter()
            .filter(|(_, r)| r.shared && r.owners.is_empty())
            .min_by_key(|(_, r)| r.last_used_tick)
            .map(|(id, r)| (*id, r.uuid));
        let (session_id, uuid) = candidate?;
        inner.locks.remove(&session_id);
        if let Some(record) = inner.sessions.remove(&session_id) {
            inner.by_vm_handle.remove(&record.vm_handle);
        }
        if inner.shared_by_uuid.get(&uuid) == Some(&session_id) {
            inner.shared_by_uuid.remove(&uuid);
        }
        Some(uuid)
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
