// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Per-node local pub/sub: a node that does not own a
//! document still needs to fan transactions out to its own connected
//! clients. It does this by subscribing to a local broadcast channel that
//! gets published into only after a `submit` RPC to the owning entity
//! succeeds — never directly from the remote owner, so every node's view
//! of "what counts as committed" stays anchored to the owner's actual
//! accept.

use std::collections::HashMap;
use std::sync::Arc;

use mimic_core::DocumentId;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use mimic_engine::TransactionBroadcast;

const LOCAL_FANOUT_CAPACITY: usize = 1024;

/// Keyed local broadcast hub. One entry per document id this node has at
/// least one local subscriber for; entries are never proactively
/// removed; a document with no subscribers just accumulates no
/// receivers and its sender is dropped lazily the next time this table
/// itself is dropped (matching how the per-document runtime also never
/// shrinks its dedup/history structures mid-flight).
#[derive(Default)]
pub struct SubscriptionStore {
    channels: Mutex<HashMap<DocumentId, broadcast::Sender<TransactionBroadcast>>>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this node's connection handler to local fan-out for
    /// `id`, creating the channel on first use.
    pub fn subscribe(&self, id: &DocumentId) -> broadcast::Receiver<TransactionBroadcast> {
        let mut channels = self.channels.lock();
        channels
            .entry(id.clone())
            .or_insert_with(|| broadcast::channel(LOCAL_FANOUT_CAPACITY).0)
            .subscribe()
    }

    /// Publish a transaction that this node's own `submit` RPC just had
    /// accepted by the owning entity. A no-op, cost-wise, if nobody on
    /// this node is subscribed to `id`.
    pub fn publish(&self, id: &DocumentId, broadcast: TransactionBroadcast) {
        let channels = self.channels.lock();
        if let Some(sender) = channels.get(id) {
            let _ = sender.send(broadcast);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_core::EncodedTransaction;

    #[tokio::test]
    async fn a_local_subscriber_receives_a_published_transaction() {
        let store = SubscriptionStore::new();
        let id = DocumentId::parse("doc-1").unwrap();
        let mut rx = store.subscribe(&id);

        store.publish(
            &id,
            TransactionBroadcast {
                transaction: EncodedTransaction(serde_json::json!({"a": 1})),
                version: 1,
            },
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.version, 1);
    }

    #[tokio::test]
    async fn publishing_with_no_subscribers_does_not_panic() {
        let store = SubscriptionStore::new();
        let id = DocumentId::parse("doc-1").unwrap();
        store.publish(
            &id,
            TransactionBroadcast {
                transaction: EncodedTransaction(serde_json::json!({"a": 1})),
                version: 1,
            },
        );
    }
}
