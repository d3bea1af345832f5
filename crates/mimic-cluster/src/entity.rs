// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Per-document entity mailbox for owner-side RPC servicing: concurrency
//! = 1, mailbox capacity = 4096. The document
//! runtime's own actor (`mimic_engine::runtime`) already serializes
//! submits for a single process; this layer exists on top of it to bound
//! how much concurrent RPC traffic one node will admit per document
//! before applying backpressure to callers, independent of how many
//! remote nodes are forwarding work to this owner at once.

use std::collections::HashMap;
use std::sync::Arc;

use mimic_core::{Clock, ConnectionId, DocumentId, PresenceEntry, Transaction, Version};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use mimic_engine::{DocumentRegistry, RestoreError, SubmitError};

/// Mailbox capacity. A node that cannot keep up with its
/// owned entities' RPC volume backpressures its callers rather than
/// growing memory without bound.
pub const ENTITY_MAILBOX_CAPACITY: usize = 4096;

enum EntityCommand {
    Submit {
        transaction: Transaction,
        respond_to: oneshot::Sender<Result<Version, SubmitError>>,
    },
    GetSnapshot {
        respond_to: oneshot::Sender<Result<(Value, Version), RestoreError>>,
    },
    Touch {
        respond_to: oneshot::Sender<Result<(), RestoreError>>,
    },
    SetPresence {
        connection_id: ConnectionId,
        entry: PresenceEntry,
        respond_to: oneshot::Sender<Result<(), RestoreError>>,
    },
    RemovePresence {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<Result<(), RestoreError>>,
    },
    GetPresenceSnapshot {
        respond_to: oneshot::Sender<Result<HashMap<ConnectionId, PresenceEntry>, RestoreError>>,
    },
}

/// One entity's single-consumer mailbox, backed by the shared document
/// registry for materialization. Holding a clone of the `mpsc::Sender`
/// is cheap; the worker task that drains it is what enforces
/// concurrency = 1 across every caller on this node.
#[derive(Clone)]
struct Entity {
    commands: mpsc::Sender<EntityCommand>,
}

impl Entity {
    fn spawn<C: Clock>(id: DocumentId, registry: Arc<DocumentRegistry<C>>, clock: C) -> Self {
        let (commands, mut rx) = mpsc::channel(ENTITY_MAILBOX_CAPACITY);
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    EntityCommand::Submit {
                        transaction,
                        respond_to,
                    } => {
                        let result = match registry.get_or_create(&id).await {
                            Ok(handle) => handle.submit(transaction).await,
                            Err(error) => Err(SubmitError::Internal(error.to_string())),
                        };
                        let _ = respond_to.send(result);
                    }
                    EntityCommand::GetSnapshot { respond_to } => {
                        let result = registry
                            .get_or_create(&id)
                            .await
                            .map(|handle| handle.get_snapshot());
                        let _ = respond_to.send(result);
                    }
                    EntityCommand::Touch { respond_to } => {
                        let now = clock.now();
                        let result = registry.get_or_create(&id).await.map(|handle| handle.touch(now));
                        let _ = respond_to.send(result);
                    }
                    EntityCommand::SetPresence {
                        connection_id,
                        entry,
                        respond_to,
                    } => {
                        let result = registry
                            .get_or_create(&id)
                            .await
                            .map(|handle| handle.presence_set(connection_id, entry));
                        let _ = respond_to.send(result);
                    }
                    EntityCommand::RemovePresence {
                        connection_id,
                        respond_to,
                    } => {
                        let result = registry
                            .get_or_create(&id)
                            .await
                            .map(|handle| handle.presence_remove(connection_id));
                        let _ = respond_to.send(result);
                    }
                    EntityCommand::GetPresenceSnapshot { respond_to } => {
                        let result = registry
                            .get_or_create(&id)
                            .await
                            .map(|handle| handle.presence_snapshot());
                        let _ = respond_to.send(result);
                    }
                }
            }
        });
        Self { commands }
    }
}

/// Owner-side table of live entity mailboxes, one per document this node
/// owns. Entities are created lazily and live for the process lifetime;
/// the underlying `DocumentRegistry` still performs idle eviction of the
/// actual runtime independently of this table.
pub struct EntityTable<C: Clock> {
    registry: Arc<DocumentRegistry<C>>,
    clock: C,
    entities: Mutex<HashMap<DocumentId, Entity>>,
}

#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("entity mailbox for document is no longer accepting commands")]
    MailboxClosed,
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Restore(#[from] RestoreError),
}

impl<C: Clock> EntityTable<C> {
    /// `clock` should be the same instance the backing `registry` was
    /// constructed with, so a `Touch` RPC timestamps with the clock a test
    /// can drive deterministically rather than real wall time.
    pub fn new(registry: Arc<DocumentRegistry<C>>, clock: C) -> Self {
        Self {
            registry,
            clock,
            entities: Mutex::new(HashMap::new()),
        }
    }

    fn entity(&self, id: &DocumentId) -> Entity {
        let mut entities = self.entities.lock();
        entities
            .entry(id.clone())
            .or_insert_with(|| Entity::spawn(id.clone(), self.registry.clone(), self.clock.clone()))
            .clone()
    }

    pub async fn submit(&self, id: &DocumentId, transaction: Transaction) -> Result<Version, EntityError> {
        let (respond_to, rx) = oneshot::channel();
        let entity = self.entity(id);
        entity
            .commands
            .send(EntityCommand::Submit {
                transaction,
                respond_to,
            })
            .await
            .map_err(|_| EntityError::MailboxClosed)?;
        Ok(rx.await.map_err(|_| EntityError::MailboxClosed)??)
    }

    pub async fn get_snapshot(&self, id: &DocumentId) -> Result<(Value, Version), EntityError> {
        let (respond_to, rx) = oneshot::channel();
        self.entity(id)
            .commands
            .send(EntityCommand::GetSnapshot { respond_to })
            .await
            .map_err(|_| EntityError::MailboxClosed)?;
        Ok(rx.await.map_err(|_| EntityError::MailboxClosed)??)
    }

    pub async fn touch(&self, id: &DocumentId) -> Result<(), EntityError> {
        let (respond_to, rx) = oneshot::channel();
        self.entity(id)
            .commands
            .send(EntityCommand::Touch { respond_to })
            .await
            .map_err(|_| EntityError::MailboxClosed)?;
        Ok(rx.await.map_err(|_| EntityError::MailboxClosed)??)
    }

    pub async fn set_presence(
        &self,
        id: &DocumentId,
        connection_id: ConnectionId,
        entry: PresenceEntry,
    ) -> Result<(), EntityError> {
        let (respond_to, rx) = oneshot::channel();
        self.entity(id)
            .commands
            .send(EntityCommand::SetPresence {
                connection_id,
                entry,
                respond_to,
            })
            .await
            .map_err(|_| EntityError::MailboxClosed)?;
        Ok(rx.await.map_err(|_| EntityError::MailboxClosed)??)
    }

    pub async fn remove_presence(&self, id: &DocumentId, connection_id: ConnectionId) -> Result<(), EntityError> {
        let (respond_to, rx) = oneshot::channel();
        self.entity(id)
            .commands
            .send(EntityCommand::RemovePresence {
                connection_id,
                respond_to,
            })
            .await
            .map_err(|_| EntityError::MailboxClosed)?;
        Ok(rx.await.map_err(|_| EntityError::MailboxClosed)??)
    }

    pub async fn get_presence_snapshot(
        &self,
        id: &DocumentId,
    ) -> Result<HashMap<ConnectionId, PresenceEntry>, EntityError> {
        let (respond_to, rx) = oneshot::channel();
        self.entity(id)
            .commands
            .send(EntityCommand::GetPresenceSnapshot { respond_to })
            .await
            .map_err(|_| EntityError::MailboxClosed)?;
        Ok(rx.await.map_err(|_| EntityError::MailboxClosed)??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_core::{FakeClock, TransactionId};
    use mimic_engine::EngineConfig;
    use mimic_schema_json::JsonMergePatchApplier;
    use mimic_storage::{InMemoryColdStorage, InMemoryHotStorage};

    fn registry(clock: FakeClock) -> Arc<DocumentRegistry<FakeClock>> {
        DocumentRegistry::new(
            mimic_engine::EngineDeps {
                cold: Arc::new(InMemoryColdStorage::new()),
                hot: Arc::new(InMemoryHotStorage::new()),
                schema: Arc::new(JsonMergePatchApplier::new()),
            },
            clock,
            EngineConfig::default(),
        )
    }

    fn entity_table() -> EntityTable<FakeClock> {
        let clock = FakeClock::new();
        EntityTable::new(registry(clock.clone()), clock)
    }

    #[tokio::test]
    async fn submit_through_the_entity_table_materializes_and_commits() {
        let table = entity_table();
        let id = DocumentId::parse("doc-1").unwrap();
        let version = table
            .submit(
                &id,
                Transaction {
                    id: TransactionId::new("t1"),
                    ops: vec![serde_json::json!({"a": 1})],
                    timestamp: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(version, 1);

        let (state, version) = table.get_snapshot(&id).await.unwrap();
        assert_eq!(version, 1);
        assert_eq!(state, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn presence_round_trips_through_the_entity_table() {
        let table = entity_table();
        let id = DocumentId::parse("doc-1").unwrap();
        let connection_id = ConnectionId::new();
        table
            .set_presence(
                &id,
                connection_id.clone(),
                PresenceEntry {
                    data: serde_json::json!({"cursor": 1}),
                    user_id: Some("u1".to_string()),
                },
            )
            .await
            .unwrap();

        let snapshot = table.get_presence_snapshot(&id).await.unwrap();
        assert_eq!(snapshot.len(), 1);

        table.remove_presence(&id, connection_id).await.unwrap();
        let snapshot = table.get_presence_snapshot(&id).await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn touch_rpc_stamps_with_the_registrys_injected_clock() {
        let clock = FakeClock::new();
        let registry = registry(clock.clone());
        let table = EntityTable::new(registry.clone(), clock.clone());
        let id = DocumentId::parse("doc-1").unwrap();

        clock.advance(std::time::Duration::from_secs(30));
        table.touch(&id).await.unwrap();

        let handle = registry.get(&id).unwrap();
        assert_eq!(handle.last_activity(), clock.now());
    }
}
