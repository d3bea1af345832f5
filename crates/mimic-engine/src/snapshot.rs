// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Snapshot scheduler: trigger evaluation and the save
//! pipeline, factored out of the runtime actor loop so the idempotency
//! guard and the counters-before-truncate ordering are exercised directly
//! in unit tests without standing up a whole actor.

use std::time::{Duration, Instant};

use mimic_core::{Clock, ColdStorage, DocumentId, HotStorage, StoredSnapshot, Version};
use serde_json::Value;

#[derive(Clone, Copy, Debug)]
pub struct SnapshotTriggers {
    pub transaction_threshold: u64,
    pub interval: Duration,
}

/// Mutable snapshot bookkeeping owned by the runtime actor.
#[derive(Clone, Debug)]
pub struct SnapshotState {
    pub last_snapshot_version: Version,
    pub last_snapshot_time: Instant,
    pub transactions_since_snapshot: u64,
}

impl SnapshotState {
    pub fn fresh(now: Instant, initial_version: Version) -> Self {
        Self {
            last_snapshot_version: initial_version,
            last_snapshot_time: now,
            transactions_since_snapshot: 0,
        }
    }
}

pub fn should_snapshot(triggers: &SnapshotTriggers, snap: &SnapshotState, now: Instant) -> bool {
    snap.transactions_since_snapshot >= triggers.transaction_threshold
        || now.saturating_duration_since(snap.last_snapshot_time) >= triggers.interval
}

/// Run the save pipeline: write the snapshot, then advance the counters,
/// then truncate the WAL. A cold-storage failure is
/// logged and left for the next trigger; a truncate failure is logged at
/// warning and also left for the next trigger. Neither ever fails the
/// submit that invoked this.
pub async fn save_snapshot(
    document_id: &DocumentId,
    cold: &dyn ColdStorage,
    hot: &dyn HotStorage,
    clock: &dyn Clock,
    state: &Value,
    version: Version,
    snap: &mut SnapshotState,
) {
    if version <= snap.last_snapshot_version {
        return;
    }

    let stored = StoredSnapshot::new(state.clone(), version, clock.epoch_ms());
    match cold.save(document_id, &stored).await {
        Ok(()) => {
            // Counters update before truncation, so a failed truncate never
            // causes a repeated re-save.
            snap.last_snapshot_version = version;
            snap.last_snapshot_time = clock.now();
            snap.transactions_since_snapshot = 0;

            if let Err(error) = hot.truncate(document_id, version).await {
                tracing::warn!(document_id = %document_id, %version, %error, "WAL truncate failed, retrying on next snapshot");
            }
        }
        Err(error) => {
            tracing::error!(document_id = %document_id, %version, %error, "snapshot save failed, deferring to next trigger");
        }
    }
}
