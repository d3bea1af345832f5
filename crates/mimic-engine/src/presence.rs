// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Per-document presence registry : a map of live connection
//! ids to their presence entry, plus a pubsub of diff events. Entries are
//! pure in-memory and non-durable — evicting the runtime discards them.

use std::collections::HashMap;

use mimic_core::{ConnectionId, PresenceEntry};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// A presence diff event, as published to every subscriber of a document's
/// presence stream. Self-echo suppression  is the
/// connection handler's job at delivery time, not the registry's — the
/// registry publishes every event to every subscriber including the
/// originator.
#[derive(Clone, Debug)]
pub enum PresenceEvent {
    Update {
        id: ConnectionId,
        entry: PresenceEntry,
    },
    Remove {
        id: ConnectionId,
    },
}

pub struct PresenceRegistry {
    entries: Mutex<HashMap<ConnectionId, PresenceEntry>>,
    events: broadcast::Sender<PresenceEvent>,
}

impl PresenceRegistry {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            entries: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Upsert `entry` for `id`, then publish an `update` event.
    pub fn set(&self, id: ConnectionId, entry: PresenceEntry) {
        self.entries.lock().insert(id, entry.clone());
        let _ = self.events.send(PresenceEvent::Update { id, entry });
    }

    /// No-op if `id` is absent; otherwise remove and publish a `remove`
    /// event.
    pub fn remove(&self, id: ConnectionId) {
        let removed = self.entries.lock().remove(&id).is_some();
        if removed {
            let _ = self.events.send(PresenceEvent::Remove { id });
        }
    }

    /// Current entries, for a newly authenticated subscriber's
    /// `presence_snapshot`.
    pub fn snapshot(&self) -> HashMap<ConnectionId, PresenceEntry> {
        self.entries.lock().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.events.subscribe()
    }
}
