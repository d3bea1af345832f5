// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Storage contracts the engine depends on but never implements beyond a
//! reference driver (`mimic-storage`). Concrete drivers (in-memory,
//! Redis-like, object-store) are external collaborators injected at
//! construction.

use async_trait::async_trait;

use crate::model::{DocumentId, StoredSnapshot, Version, WalEntry};

/// Which storage call failed, carried on [`ColdStorageError`] and
/// [`HotStorageError`] so callers can log and classify without string
/// matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageOperation {
    Load,
    Save,
    Delete,
    Append,
    AppendWithCheck,
    GetEntries,
    Truncate,
}

impl std::fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StorageOperation::Load => "load",
            StorageOperation::Save => "save",
            StorageOperation::Delete => "delete",
            StorageOperation::Append => "append",
            StorageOperation::AppendWithCheck => "append_with_check",
            StorageOperation::GetEntries => "get_entries",
            StorageOperation::Truncate => "truncate",
        };
        f.write_str(s)
    }
}

/// Failure surfaced by a [`ColdStorage`] driver.
#[derive(Debug, thiserror::Error)]
#[error("cold storage {operation} failed for document {document_id}: {cause}")]
pub struct ColdStorageError {
    pub document_id: DocumentId,
    pub operation: StorageOperation,
    #[source]
    pub cause: Box<dyn std::error::Error + Send + Sync>,
}

/// Failure surfaced by a [`HotStorage`] driver.
#[derive(Debug, thiserror::Error)]
pub enum HotStorageError {
    #[error("hot storage {operation} failed for document {document_id}: {cause}")]
    Io {
        document_id: DocumentId,
        operation: StorageOperation,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error(transparent)]
    VersionGap(#[from] WalVersionGapError),
}

/// `appendWithCheck` detected that the store's last version for this
/// document was not `expected - 1` — a split-brain signal.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "append_with_check version gap for document {document_id}: expected previous version {expected_previous}, actual previous {actual_previous:?}"
)]
pub struct WalVersionGapError {
    pub document_id: DocumentId,
    pub expected_previous: Version,
    pub actual_previous: Option<Version>,
}

/// Persists and retrieves whole-document snapshots keyed by document id.
/// `save` is last-write-wins; `load` MUST be strongly consistent with a
/// prior `save` from the same caller.
#[async_trait]
pub trait ColdStorage: Send + Sync + 'static {
    async fn load(&self, id: &DocumentId) -> Result<Option<StoredSnapshot>, ColdStorageError>;
    async fn save(&self, id: &DocumentId, snapshot: &StoredSnapshot) -> Result<(), ColdStorageError>;
    async fn delete(&self, id: &DocumentId) -> Result<(), ColdStorageError>;
}

/// Appends, range-scans, and truncates a per-document ordered log of
/// transactions, with an optional optimistic version check.
/// Ordering by version is the driver's responsibility; drivers MUST be safe
/// for concurrent use across different document ids.
#[async_trait]
pub trait HotStorage: Send + Sync + 'static {
    async fn append(&self, id: &DocumentId, entry: &WalEntry) -> Result<(), HotStorageError>;

    /// Fails with [`WalVersionGapError`] if the store's last version for
    /// this document is not `expected_version - 1`.
    async fn append_with_check(
        &self,
        id: &DocumentId,
        entry: &WalEntry,
        expected_version: Version,
    ) -> Result<(), HotStorageError>;

    /// Entries strictly greater than `since_version`, in version order.
    async fn get_entries(
        &self,
        id: &DocumentId,
        since_version: Version,
    ) -> Result<Vec<WalEntry>, HotStorageError>;

    /// Removes all entries with `version <= up_to_version`.
    async fn truncate(&self, id: &DocumentId, up_to_version: Version) -> Result<(), HotStorageError>;
}
