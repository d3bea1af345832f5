// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! The RPC surface a sharded node calls on a document's owner: `Submit`,
//! `GetSnapshot`, `Touch`, `SetPresence`, `RemovePresence`,
//! `GetPresenceSnapshot`. `ClusterTransport` is a narrow
//! injected trait, analogous to the treatment of storage/auth as
//! external collaborators — the routing/mailbox/fan-out logic in this
//! crate is transport-agnostic and testable with an in-process fake,
//! without pulling in a concrete RPC framework this workspace otherwise
//! has no use for.

use async_trait::async_trait;
use mimic_core::{ConnectionId, DocumentId, PresenceEntry, Transaction, Version};
use serde_json::Value;
use std::collections::HashMap;

use crate::node::NodeId;

/// Failure calling a remote entity. Distinguishes a version-gap rejection
/// surfaced by the owner's `append_with_check` from a plain transport
/// failure (timeout, connection refused, ...).
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("node {node} unreachable: {cause}")]
    Unreachable { node: NodeId, cause: String },

    #[error("submit rejected by owner node {node}: {reason}")]
    SubmitRejected { node: NodeId, reason: String },
}

/// RPC surface forwarded to a document's owning node.
#[async_trait]
pub trait ClusterTransport: Send + Sync + 'static {
    async fn submit(
        &self,
        node: &NodeId,
        document_id: &DocumentId,
        transaction: Transaction,
    ) -> Result<Version, ClusterError>;

    async fn get_snapshot(
        &self,
        node: &NodeId,
        document_id: &DocumentId,
    ) -> Result<(Value, Version), ClusterError>;

    async fn touch(&self, node: &NodeId, document_id: &DocumentId) -> Result<(), ClusterError>;

    async fn set_presence(
        &self,
        node: &NodeId,
        document_id: &DocumentId,
        connection_id: ConnectionId,
        entry: PresenceEntry,
    ) -> Result<(), ClusterError>;

    async fn remove_presence(
        &self,
        node: &NodeId,
        document_id: &DocumentId,
        connection_id: ConnectionId,
    ) -> Result<(), ClusterError>;

    async fn get_presence_snapshot(
        &self,
        node: &NodeId,
        document_id: &DocumentId,
    ) -> Result<HashMap<ConnectionId, PresenceEntry>, ClusterError>;
}
