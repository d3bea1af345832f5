// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mimic-cluster: the sharded variant of the document-sync engine.
//! A fixed set of nodes partitions the document
//! keyspace with a sticky hash; each document lives on exactly one
//! node's [`mimic_engine::DocumentRegistry`] at a time, and every other
//! node forwards work to it over an injected [`ClusterTransport`].

pub mod entity;
pub mod node;
pub mod partition;
pub mod subscription;
pub mod transport;

use std::collections::HashMap;
use std::sync::Arc;

use mimic_core::{Clock, ConnectionId, DocumentId, PresenceEntry, Transaction, Version};
use serde_json::Value;

use mimic_engine::{DocumentRegistry, TransactionBroadcast};

pub use entity::{EntityError, EntityTable};
pub use node::NodeId;
pub use partition::{Partitioner, RendezvousPartitioner};
pub use subscription::SubscriptionStore;
pub use transport::{ClusterError, ClusterTransport};

/// Shard group name a cluster's nodes agree to partition together
/// (config default `"mimic-documents"`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardGroup(String);

impl ShardGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ShardGroup {
    fn default() -> Self {
        Self::new("mimic-documents")
    }
}

/// Routes document operations to their owning node:
/// serviced locally through the [`EntityTable`] when this node owns the
/// id, forwarded through [`ClusterTransport`] otherwise. A successful
/// remote submit is mirrored into this node's [`SubscriptionStore`] so
/// locally-connected clients still see the transaction, without this
/// node ever treating the remote RPC's own success as a second source
/// of truth.
pub struct ClusterEngine<C: Clock, T: ClusterTransport> {
    self_node: NodeId,
    partitioner: Arc<dyn Partitioner>,
    transport: Arc<T>,
    entities: EntityTable<C>,
    local_registry: Arc<DocumentRegistry<C>>,
    subscriptions: SubscriptionStore,
}

impl<C: Clock, T: ClusterTransport> ClusterEngine<C, T> {
    pub fn new(
        self_node: NodeId,
        partitioner: Arc<dyn Partitioner>,
        transport: Arc<T>,
        local_registry: Arc<DocumentRegistry<C>>,
    ) -> Self {
        let clock = local_registry.clock().clone();
        Self {
            self_node,
            partitioner,
            transport,
            entities: EntityTable::new(local_registry.clone(), clock),
            local_registry,
            subscriptions: SubscriptionStore::new(),
        }
    }

    fn owner(&self, id: &DocumentId) -> NodeId {
        self.partitioner.owner(id)
    }

    fn is_local(&self, id: &DocumentId) -> bool {
        self.owner(id) == self.self_node
    }

    /// Subscribe a local connection handler to transaction fan-out for
    /// `id`, regardless of whether this node owns it.
    pub fn subscribe(&self, id: &DocumentId) -> tokio::sync::broadcast::Receiver<TransactionBroadcast> {
        if self.is_local(id) {
            match self.local_registry.get(id) {
                Some(handle) => handle.subscribe_transactions(),
                None => self.subscriptions.subscribe(id),
            }
        } else {
            self.subscriptions.subscribe(id)
        }
    }

    pub async fn submit(&self, id: &DocumentId, transaction: Transaction) -> Result<Version, ClusterError> {
        if self.is_local(id) {
            self.entities
                .submit(id, transaction)
                .await
                .map_err(|error| ClusterError::SubmitRejected {
                    node: self.self_node.clone(),
                    reason: error.to_string(),
                })
        } else {
            let owner = self.owner(id);
            let version = self.transport.submit(&owner, id, transaction.clone()).await?;
            // Local fan-out only after the owner's RPC
            // accepts the submit, so a node's own clients never observe
            // a transaction this node itself failed to get committed.
            if let Ok(encoded) = serde_json::to_value(&transaction).map(mimic_core::EncodedTransaction) {
                self.subscriptions.publish(
                    id,
                    TransactionBroadcast {
                        transaction: encoded,
                        version,
                    },
                );
            }
            Ok(version)
        }
    }

    pub async fn get_snapshot(&self, id: &DocumentId) -> Result<(Value, Version), ClusterError> {
        if self.is_local(id) {
            self.entities
                .get_snapshot(id)
                .await
                .map_err(|error| ClusterError::SubmitRejected {
                    node: self.self_node.clone(),
                    reason: error.to_string(),
                })
        } else {
            let owner = self.owner(id);
            self.transport.get_snapshot(&owner, id).await
        }
    }

    pub async fn touch(&self, id: &DocumentId) -> Result<(), ClusterError> {
        if self.is_local(id) {
            self.entities.touch(id).await.map_err(|error| ClusterError::SubmitRejected {
                node: self.self_node.clone(),
                reason: error.to_string(),
            })
        } else {
            let owner = self.owner(id);
            self.transport.touch(&owner, id).await
        }
    }

    pub async fn set_presence(
        &self,
        id: &DocumentId,
        connection_id: ConnectionId,
        entry: PresenceEntry,
    ) -> Result<(), ClusterError> {
        if self.is_local(id) {
            self.entities
                .set_presence(id, connection_id, entry)
                .await
                .map_err(|error| ClusterError::SubmitRejected {
                    node: self.self_node.clone(),
                    reason: error.to_string(),
                })
        } else {
            let owner = self.owner(id);
            self.transport.set_presence(&owner, id, connection_id, entry).await
        }
    }

    pub async fn remove_presence(&self, id: &DocumentId, connection_id: ConnectionId) -> Result<(), ClusterError> {
        if self.is_local(id) {
            self.entities
                .remove_presence(id, connection_id)
                .await
                .map_err(|error| ClusterError::SubmitRejected {
                    node: self.self_node.clone(),
                    reason: error.to_string(),
                })
        } else {
            let owner = self.owner(id);
            self.transport.remove_presence(&owner, id, connection_id).await
        }
    }

    pub async fn get_presence_snapshot(
        &self,
        id: &DocumentId,
    ) -> Result<HashMap<ConnectionId, PresenceEntry>, ClusterError> {
        if self.is_local(id) {
            self.entities
                .get_presence_snapshot(id)
                .await
                .map_err(|error| ClusterError::SubmitRejected {
                    node: self.self_node.clone(),
                    reason: error.to_string(),
                })
        } else {
            let owner = self.owner(id);
            self.transport.get_presence_snapshot(&owner, id).await
        }
    }
}
