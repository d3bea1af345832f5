// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Engine-wide configuration, mirroring the recognized options of a
//! document-sync engine instance. `initial` (a nil / static-value /
//! lazy-function initializer) is expressed through
//! `SchemaApplier::initial_state` rather than a field here, since it is
//! inherently per-schema behavior.

use std::time::Duration;

/// Tunables for one [`crate::registry::DocumentRegistry`] and the runtimes
/// it materializes.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Eviction threshold for an idle document runtime.
    pub max_idle: Duration,
    /// Ring buffer size for per-document transaction-id deduplication.
    pub max_transaction_history: usize,
    /// Time-based snapshot trigger.
    pub snapshot_interval: Duration,
    /// Count-based snapshot trigger (successful submits since last snapshot).
    pub snapshot_transaction_threshold: u64,
    /// Whether the presence registry is active for documents in this
    /// registry (opt-in).
    pub presence_enabled: bool,
    /// Capacity of the per-document transaction broadcast channel before
    /// the drop-oldest + `SubscriberLagged` policy kicks in.
    pub broadcast_capacity: usize,
    /// How often the registry's idle-GC worker sweeps live runtimes.
    pub idle_gc_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_idle: Duration::from_secs(5 * 60),
            max_transaction_history: 1000,
            snapshot_interval: Duration::from_secs(5 * 60),
            snapshot_transaction_threshold: 100,
            presence_enabled: false,
            broadcast_capacity: 1024,
            idle_gc_interval: Duration::from_secs(60),
        }
    }
}
