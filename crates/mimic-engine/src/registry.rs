// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Document registry: document-id to live runtime, lazy
//! materialization guarded against the "two creators" race, idle-GC
//! eviction, and orderly shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use mimic_core::{Clock, DocumentId};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

use crate::error::RestoreError;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::runtime::{self, DocumentHandle, EngineDeps};
use crate::EngineConfig;

/// Map of live document runtimes for one engine instance, plus the state
/// its background idle-GC worker needs.
pub struct DocumentRegistry<C: Clock> {
    deps: EngineDeps,
    clock: C,
    config: EngineConfig,
    metrics: Arc<Metrics>,
    runtimes: Mutex<HashMap<DocumentId, Arc<DocumentHandle>>>,
    /// One lock per in-flight materialization, so concurrent first-touches
    /// of the same id block on each other instead of racing two restores
    /// (the "double-checked" creation lock).
    creation_locks: Mutex<HashMap<DocumentId, Arc<AsyncMutex<()>>>>,
    gc_cancel: CancellationToken,
}

impl<C: Clock> DocumentRegistry<C> {
    /// Construct a registry and spawn its idle-GC background worker.
    /// Callers that never intend to run the worker (e.g. a unit test
    /// driving a handful of `get_or_create` calls synchronously) may still
    /// call [`DocumentRegistry::shutdown`] to stop it cleanly.
    pub fn new(deps: EngineDeps, clock: C, config: EngineConfig) -> Arc<Self> {
        let registry = Arc::new(Self {
            deps,
            clock,
            config,
            metrics: Arc::new(Metrics::new()),
            runtimes: Mutex::new(HashMap::new()),
            creation_locks: Mutex::new(HashMap::new()),
            gc_cancel: CancellationToken::new(),
        });
        Self::spawn_idle_gc(registry.clone());
        registry
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The clock this registry was constructed with, so collaborators that
    /// need to touch a runtime from outside a connection handler (cluster
    /// RPC servicing) can timestamp with the same injected clock rather
    /// than reaching for `Instant::now()` directly.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Lazily materialize the runtime for `id`: fast path on an existing
    /// entry, otherwise restore under a per-id lock.
    pub async fn get_or_create(&self, id: &DocumentId) -> Result<Arc<DocumentHandle>, RestoreError> {
        if let Some(existing) = self.runtimes.lock().get(id).cloned() {
            return Ok(existing);
        }

        let creation_lock = self
            .creation_locks
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = creation_lock.lock().await;

        // Double-checked: whoever held the lock before us may have already
        // installed the runtime.
        if let Some(existing) = self.runtimes.lock().get(id).cloned() {
            return Ok(existing);
        }

        let handle = runtime::restore(id.clone(), &self.deps, self.clock.clone(), &self.config, &self.metrics)
            .await?;
        self.runtimes.lock().insert(id.clone(), handle.clone());
        Ok(handle)
    }

    /// `None` if `id` has no live runtime right now.
    pub fn get(&self, id: &DocumentId) -> Option<Arc<DocumentHandle>> {
        self.runtimes.lock().get(id).cloned()
    }

    fn spawn_idle_gc(registry: Arc<Self>) {
        let interval = registry.config.idle_gc_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = registry.gc_cancel.cancelled() => break,
                    _ = ticker.tick() => registry.run_idle_gc().await,
                }
            }
        });
    }

    /// Idle GC: snapshot-and-evict every runtime idle for at
    /// least `maxIdleTime`. A snapshot failure is logged but never stops
    /// eviction — durability still rests on the WAL.
    async fn run_idle_gc(&self) {
        let now = self.clock.now();
        let idle: Vec<DocumentId> = self
            .runtimes
            .lock()
            .iter()
            .filter(|(_, handle)| now.saturating_duration_since(handle.last_activity()) >= self.config.max_idle)
            .map(|(id, _)| id.clone())
            .collect();

        for id in idle {
            let handle = self.runtimes.lock().remove(&id);
            let Some(handle) = handle else { continue };
            handle.snapshot_now().await;
            self.creation_locks.lock().remove(&id);
            self.metrics.record_evicted();
            tracing::info!(document_id = %id, "evicted idle document runtime");
        }
    }

    /// Shutdown: best-effort final snapshot of every live
    /// runtime. Completes even if some snapshots fail (failures are logged
    /// inside the snapshot scheduler itself).
    pub async fn shutdown(&self) {
        self.gc_cancel.cancel();
        let handles: Vec<Arc<DocumentHandle>> = self.runtimes.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.snapshot_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_core::{ColdStorage, FakeClock, Transaction, TransactionId};
    use mimic_schema_json::JsonMergePatchApplier;
    use mimic_storage::{InMemoryColdStorage, InMemoryHotStorage};
    use std::time::Duration;

    fn deps() -> EngineDeps {
        EngineDeps {
            cold: Arc::new(InMemoryColdStorage::new()),
            hot: Arc::new(InMemoryHotStorage::new()),
            schema: Arc::new(JsonMergePatchApplier::new()),
        }
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_handle_on_second_call() {
        let registry = DocumentRegistry::new(deps(), FakeClock::new(), EngineConfig::default());
        let id = DocumentId::parse("doc-1").unwrap();
        let first = registry.get_or_create(&id).await.unwrap();
        let second = registry.get_or_create(&id).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn idle_runtime_is_evicted_and_snapshotted() {
        let cold = Arc::new(InMemoryColdStorage::new());
        let deps = EngineDeps {
            cold: cold.clone(),
            hot: Arc::new(InMemoryHotStorage::new()),
            schema: Arc::new(JsonMergePatchApplier::new()),
        };
        let clock = FakeClock::new();
        let config = EngineConfig {
            max_idle: Duration::from_secs(60),
            idle_gc_interval: Duration::from_millis(10),
            ..EngineConfig::default()
        };
        let registry = DocumentRegistry::new(deps, clock.clone(), config);
        let id = DocumentId::parse("doc-1").unwrap();
        let handle = registry.get_or_create(&id).await.unwrap();
        handle
            .submit(Transaction {
                id: TransactionId::new("t1"),
                ops: vec![serde_json::json!({"a": 1})],
                timestamp: 0,
            })
            .await
            .unwrap();

        clock.advance(Duration::from_secs(61));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(registry.get(&id).is_none());
        let snapshot = cold.load(&id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(registry.metrics().documents_evicted, 1);
    }
}
