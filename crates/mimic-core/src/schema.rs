// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! The document schema/operation library is an opaque validator + applier:
//! `{validate(tx), apply(state, ops) -> state,
//! encode(tx) -> wire form, decode(wire form) -> tx}` injected into the
//! runtime. This module only names the interface; `mimic-schema-json`
//! provides a reference JSON-merge-patch-shaped implementation.

use async_trait::async_trait;

use crate::model::Transaction;

/// The canonicalized wire form of a [`Transaction`], produced by
/// [`SchemaApplier::encode`] and consumed by [`SchemaApplier::decode`]. The
/// codec and engine never interpret its contents; only the applier does.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EncodedTransaction(pub serde_json::Value);

/// Failure from the schema/operation library: a malformed op during
/// validation, an encode/decode mismatch, or an apply-time rejection.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SchemaError(pub String);

impl SchemaError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Opaque document schema/operation library, injected into the document
/// runtime. Implementations decide what a valid `ops` value
/// looks like and how it folds over document state; the engine only calls
/// through this trait.
#[async_trait]
pub trait SchemaApplier: Send + Sync + 'static {
    /// Validate a transaction's `ops` against the current state, without
    /// mutating anything. Returns the reason a malformed op is rejected, if
    /// any.
    fn validate(&self, state: &serde_json::Value, ops: &[serde_json::Value]) -> Result<(), SchemaError>;

    /// Fold `ops` over `state`, producing the next state. Called only after
    /// `validate` has accepted the same `ops`.
    fn apply(
        &self,
        state: &serde_json::Value,
        ops: &[serde_json::Value],
    ) -> Result<serde_json::Value, SchemaError>;

    /// Produce the canonicalized wire form of a transaction.
    fn encode(&self, transaction: &Transaction) -> Result<EncodedTransaction, SchemaError>;

    /// Recover a transaction from its canonicalized wire form.
    fn decode(&self, encoded: &EncodedTransaction) -> Result<Transaction, SchemaError>;

    /// Lazily compute the initial state for a fresh document. Evaluated
    /// only at restore time when no snapshot exists, and may itself depend
    /// on external services. Default:
    /// `serde_json::Value::Null`.
    async fn initial_state(&self, _document_id: &str) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Opaque presence schema, injected opt-in. Only
/// consulted on `presence_set`, never on `presence_clear`; absent entirely
/// when presence is disabled for a registry.
pub trait PresenceValidator: Send + Sync + 'static {
    fn validate(&self, data: &serde_json::Value) -> Result<(), SchemaError>;
}
