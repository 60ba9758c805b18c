// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::VecDeque;

use dal_core::{AppletUuid, MAX_SESSION_EVENT_QUEUE, MAX_SESSION_OWNERS, Owner, SessionId};
use dal_plugin::{EventData, VmHandle};

use crate::event_sink::EventSink;

/// One open session (spec §3, §4.4 C5). Per-session state lives here;
/// cross-session indices (by uuid, by VM handle) live in [`crate::SessionManager`].
pub struct SessionRecord {
    pub session_id: SessionId,
    pub vm_handle: VmHandle,
    pub uuid: AppletUuid,
    pub flags: u32,
    pub shared: bool,
    pub owners: Vec<Owner>,
    pub event_sink: Option<Box<dyn EventSink>>,
    pub event_queue: VecDeque<EventData>,
    pub dropped_events: u64,
    pub last_used_tick: u64,
}

impl SessionRecord {
    pub fn new(session_id: SessionId, vm_handle: VmHandle, uuid: AppletUuid, flags: u32, shared: bool, owner: Owner, now: u64) -> Self {
        Self {
            session_id,
            vm_handle,
            uuid,
            flags,
            shared,
            owners: vec![owner],
            event_sink: None,
            event_queue: VecDeque::new(),
            dropped_events: 0,
            last_used_tick: now,
        }
    }

    /// I2: at most [`MAX_SESSION_OWNERS`] owners per session.
    pub fn add_owner(&mut self, owner: Owner) -> bool {
        if self.owners.contains(&owner) {
            return true;
        }
        if self.owners.len() >= MAX_SESSION_OWNERS {
            return false;
        }
        self.owners.push(owner);
        true
    }

    pub fn remove_owner(&mut self, owner: &Owner) -> bool {
        let before = self.owners.len();
        self.owners.retain(|o| o != owner);
        self.owners.len() != before
    }

    pub fn is_owner_valid(&self, owner: &Owner) -> bool {
        self.owners.contains(owner)
    }

    /// Queue one event. Once the queue holds [`MAX_SESSION_EVENT_QUEUE`]
    /// entries, the *new* event is rejected and the existing entries are
    /// left untouched (spec §8: "enqueues above the bound return `false`
    /// and do not drop existing entries").
    pub fn enqueue_event(&mut self, event: EventData) -> bool {
        if self.event_queue.len() >= MAX_SESSION_EVENT_QUEUE {
            self.dropped_events += 1;
            tracing::warn!(session = %self.session_id, dropped = self.dropped_events, "session event queue full, dropping new event");
            return false;
        }
        self.event_queue.push_back(event);
        true
    }

    pub fn dequeue_event(&mut self) -> Option<EventData> {
        self.event_queue.pop_front()
    }
}
