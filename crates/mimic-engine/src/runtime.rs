// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! The per-document runtime: owns the authoritative state of
//! one document, validates/applies/broadcasts submitted transactions, and
//! runs the restore pipeline on first materialization.
//!
//! Single-writer serialization is structural rather than a locking
//! discipline the reader has to trust: one actor task owns a mailbox
//! (`tokio::sync::mpsc`) and processes one `submit` at a time, an
//! engine-loop-over-a-channel pattern. Reads
//! (`get_snapshot`, presence, subscriptions) bypass the mailbox entirely
//! and go straight to state shared behind a `parking_lot::RwLock`/`Mutex`,
//! since they only ever observe the atomic replace the actor performs at
//! the end of the apply phase.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use mimic_core::{
    Clock, ColdStorage, ConnectionId, DocumentId, EncodedTransaction, HotStorage, PresenceEntry,
    SchemaApplier, Transaction, Version,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::dedup::DedupRingBuffer;
use crate::error::{RestoreError, SubmitError};
use crate::metrics::Metrics;
use crate::presence::{PresenceEvent, PresenceRegistry};
use crate::snapshot::{save_snapshot, should_snapshot, SnapshotState, SnapshotTriggers};
use crate::EngineConfig;

/// Collaborators shared by every document a [`crate::registry::DocumentRegistry`]
/// materializes: storage and schema are external, injected
/// collaborators.
pub struct EngineDeps {
    pub cold: Arc<dyn ColdStorage>,
    pub hot: Arc<dyn HotStorage>,
    pub schema: Arc<dyn SchemaApplier>,
}

/// One broadcast transaction, published after phase 3 of a successful
/// submit. Carries the applier's canonicalized wire form ;
/// the engine never re-interprets `ops` itself.
#[derive(Clone, Debug)]
pub struct TransactionBroadcast {
    pub transaction: EncodedTransaction,
    pub version: Version,
}

struct CommittedState {
    state: Value,
    version: Version,
}

/// State shared between the actor task and every [`DocumentHandle`] clone,
/// each field protected the narrowest way it needs.
struct DocumentShared {
    committed: RwLock<CommittedState>,
    presence: PresenceRegistry,
    transactions: broadcast::Sender<TransactionBroadcast>,
    last_activity: Mutex<Instant>,
}

enum RuntimeCommand {
    Submit {
        transaction: Transaction,
        respond_to: oneshot::Sender<Result<Version, SubmitError>>,
    },
    SnapshotNow {
        respond_to: oneshot::Sender<()>,
    },
}

/// A cheaply-cloneable, `Send + Sync` reference to one live document
/// runtime. The single public entry point connection handlers and the
/// sharded variant's entity layer hold onto.
pub struct DocumentHandle {
    id: DocumentId,
    commands: mpsc::Sender<RuntimeCommand>,
    shared: Arc<DocumentShared>,
}

impl DocumentHandle {
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Submit a transaction through the single-writer serialization point
    /// (the three-phase pipeline). Suspends until this and every
    /// submit ahead of it in the mailbox has been processed.
    pub async fn submit(&self, transaction: Transaction) -> Result<Version, SubmitError> {
        let (respond_to, rx) = oneshot::channel();
        if self
            .commands
            .send(RuntimeCommand::Submit {
                transaction,
                respond_to,
            })
            .await
            .is_err()
        {
            return Err(SubmitError::RuntimeGone);
        }
        rx.await.unwrap_or(Err(SubmitError::RuntimeGone))
    }

    /// Cheap read of the latest committed state (
    /// `getSnapshot`). Never suspends on the submit mailbox.
    pub fn get_snapshot(&self) -> (Value, Version) {
        let committed = self.shared.committed.read();
        (committed.state.clone(), committed.version)
    }

    pub fn subscribe_transactions(&self) -> broadcast::Receiver<TransactionBroadcast> {
        self.shared.transactions.subscribe()
    }

    pub fn subscribe_presence(&self) -> broadcast::Receiver<PresenceEvent> {
        self.shared.presence.subscribe()
    }

    pub fn presence_set(&self, connection_id: ConnectionId, entry: PresenceEntry) {
        self.shared.presence.set(connection_id, entry);
    }

    pub fn presence_remove(&self, connection_id: ConnectionId) {
        self.shared.presence.remove(connection_id);
    }

    pub fn presence_snapshot(&self) -> HashMap<ConnectionId, PresenceEntry> {
        self.shared.presence.snapshot()
    }

    /// Bump last-activity; every inbound connection message does this.
    /// Independent of the submit mailbox.
    pub fn touch(&self, now: Instant) {
        *self.shared.last_activity.lock() = now;
    }

    pub fn last_activity(&self) -> Instant {
        *self.shared.last_activity.lock()
    }

    /// Force the snapshot scheduler to run the save pipeline now,
    /// regardless of its triggers — used for idle eviction and orderly
    /// shutdown . Routed through the mailbox so it
    /// never races a concurrent submit's phase 3.
    pub async fn snapshot_now(&self) {
        let (respond_to, rx) = oneshot::channel();
        if self
            .commands
            .send(RuntimeCommand::SnapshotNow { respond_to })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

struct RuntimeActor<C: Clock> {
    id: DocumentId,
    cold: Arc<dyn ColdStorage>,
    hot: Arc<dyn HotStorage>,
    schema: Arc<dyn SchemaApplier>,
    clock: C,
    shared: Arc<DocumentShared>,
    dedup: DedupRingBuffer,
    snapshot_state: SnapshotState,
    snapshot_triggers: SnapshotTriggers,
    rx: mpsc::Receiver<RuntimeCommand>,
}

impl<C: Clock> RuntimeActor<C> {
    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                RuntimeCommand::Submit {
                    transaction,
                    respond_to,
                } => {
                    let result = self.submit(transaction).await;
                    let _ = respond_to.send(result);
                }
                RuntimeCommand::SnapshotNow { respond_to } => {
                    self.snapshot_now().await;
                    let _ = respond_to.send(());
                }
            }
        }
    }

    ///  "Submit pipeline": validate, durable append, apply &
    /// broadcast. A failure after any phase leaves the runtime
    /// invariant-preserving.
    async fn submit(&mut self, transaction: Transaction) -> Result<Version, SubmitError> {
        if transaction.ops.is_empty() {
            return Err(SubmitError::EmptyTransaction);
        }
        if self.dedup.contains(&transaction.id) {
            return Err(SubmitError::AlreadyProcessed);
        }

        let (state, current_version) = {
            let committed = self.shared.committed.read();
            (committed.state.clone(), committed.version)
        };

        self.schema
            .validate(&state, &transaction.ops)
            .map_err(|e| SubmitError::SchemaRejected(e.0))?;

        let next_version = current_version + 1;
        let entry = mimic_core::WalEntry {
            transaction: transaction.clone(),
            version: next_version,
            timestamp: self.clock.epoch_ms(),
        };

        // The single-node engine and the sharded variant share one call:
        // `expectedVersion` is always `nextVersion`. Per-document
        // serialization already rules out split-brain here; the sharded
        // entity is where this check earns its keep.
        self.hot
            .append_with_check(&self.id, &entry, next_version)
            .await
            .map_err(SubmitError::StorageUnavailable)?;

        let new_state = match self.schema.apply(&state, &transaction.ops) {
            Ok(state) => state,
            Err(error) => {
                tracing::error!(
                    document_id = %self.id,
                    version = next_version,
                    %error,
                    "schema applier rejected ops at apply time after accepting them at validate time"
                );
                return Err(SubmitError::Internal(error.0));
            }
        };

        let encoded = self
            .schema
            .encode(&transaction)
            .map_err(|e| SubmitError::Internal(e.0))?;

        {
            let mut committed = self.shared.committed.write();
            committed.state = new_state.clone();
            committed.version = next_version;
        }
        self.dedup.insert(transaction.id.clone());

        // A bounded channel with an explicit drop-oldest policy — a
        // lagging receiver just observes `RecvError::Lagged` and the
        // connection handler turns that into a `subscriber_lagged` notice.
        let _ = self.shared.transactions.send(TransactionBroadcast {
            transaction: encoded,
            version: next_version,
        });

        self.snapshot_state.transactions_since_snapshot += 1;
        if should_snapshot(&self.snapshot_triggers, &self.snapshot_state, self.clock.now()) {
            save_snapshot(
                &self.id,
                self.cold.as_ref(),
                self.hot.as_ref(),
                &self.clock,
                &new_state,
                next_version,
                &mut self.snapshot_state,
            )
            .await;
        }

        Ok(next_version)
    }

    async fn snapshot_now(&mut self) {
        let (state, version) = {
            let committed = self.shared.committed.read();
            (committed.state.clone(), committed.version)
        };
        save_snapshot(
            &self.id,
            self.cold.as_ref(),
            self.hot.as_ref(),
            &self.clock,
            &state,
            version,
            &mut self.snapshot_state,
        )
        .await;
    }
}

///  "Restore pipeline": load snapshot, load WAL tail, replay,
/// spawn the actor, and return a live [`DocumentHandle`].
pub async fn restore<C: Clock>(
    id: DocumentId,
    deps: &EngineDeps,
    clock: C,
    config: &EngineConfig,
    metrics: &Metrics,
) -> Result<Arc<DocumentHandle>, RestoreError> {
    let loaded = deps.cold.load(&id).await?;
    let (mut state, initial_version, loaded_snapshot) = match loaded {
        Some(snapshot) => (snapshot.state, snapshot.version, true),
        None => (deps.schema.initial_state(id.as_str()).await, 0, false),
    };

    let entries = deps.hot.get_entries(&id, initial_version).await?;

    if let Some(first) = entries.first() {
        if first.version != initial_version + 1 {
            tracing::warn!(
                document_id = %id,
                expected_version = initial_version + 1,
                actual_version = first.version,
                "WAL gap on restore: first entry does not follow the loaded snapshot"
            );
        }
    }
    for pair in entries.windows(2) {
        if pair[1].version != pair[0].version + 1 {
            tracing::warn!(
                document_id = %id,
                previous_version = pair[0].version,
                next_version = pair[1].version,
                "internal WAL gap between consecutive entries on restore"
            );
        }
    }

    let mut version = initial_version;
    let mut dedup = DedupRingBuffer::new(config.max_transaction_history);
    for entry in &entries {
        match deps.schema.apply(&state, &entry.transaction.ops) {
            Ok(next) => {
                state = next;
                version = entry.version;
                dedup.insert(entry.transaction.id.clone());
            }
            Err(error) => {
                tracing::warn!(
                    document_id = %id,
                    version = entry.version,
                    %error,
                    "WAL entry rejected by schema applier during replay, skipping"
                );
            }
        }
    }

    if loaded_snapshot {
        metrics.record_restored();
    } else {
        metrics.record_created();
    }

    let (transactions, _) = broadcast::channel(config.broadcast_capacity);
    let shared = Arc::new(DocumentShared {
        committed: RwLock::new(CommittedState { state, version }),
        presence: PresenceRegistry::new(config.broadcast_capacity),
        transactions,
        last_activity: Mutex::new(clock.now()),
    });

    let (commands, rx) = mpsc::channel(256);
    let actor = RuntimeActor {
        id: id.clone(),
        cold: deps.cold.clone(),
        hot: deps.hot.clone(),
        schema: deps.schema.clone(),
        snapshot_state: SnapshotState::fresh(clock.now(), initial_version),
        snapshot_triggers: SnapshotTriggers {
            transaction_threshold: config.snapshot_transaction_threshold,
            interval: config.snapshot_interval,
        },
        clock,
        shared: shared.clone(),
        dedup,
        rx,
    };
    tokio::spawn(actor.run());

    Ok(Arc::new(DocumentHandle {
        id,
        commands,
        shared,
    }))
}
