// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

use mimic_core::{ColdStorageError, HotStorageError};

/// Why a `submit` was rejected. All variants are
/// non-fatal and per-request: the connection stays open and the rejection
/// surfaces as a single-transaction `error` server message.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Transaction is empty")]
    EmptyTransaction,

    #[error("Transaction has already been processed")]
    AlreadyProcessed,

    #[error("{0}")]
    SchemaRejected(String),

    #[error("Storage unavailable. Please retry.")]
    StorageUnavailable(#[source] HotStorageError),

    /// The schema applier accepted a transaction at validation time but
    /// rejected the same ops when applying them. The transaction is
    /// already durably appended (consistent with how a rejected WAL entry
    /// is handled during replay: logged and skipped); in-memory state is
    /// left unchanged.
    #[error("internal: schema applier rejected a previously validated transaction: {0}")]
    Internal(String),

    /// The runtime's actor task is no longer processing commands (e.g. the
    /// registry evicted it concurrently with this submit). The caller
    /// should re-materialize the document and retry.
    #[error("document runtime is no longer available")]
    RuntimeGone,
}

/// Failure materializing a document runtime during the restore pipeline.
/// Storage failures during restore propagate rather than being silently
/// treated as an empty document.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error(transparent)]
    Cold(#[from] ColdStorageError),

    #[error(transparent)]
    Hot(#[from] HotStorageError),
}
