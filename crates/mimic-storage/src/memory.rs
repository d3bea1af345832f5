// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! In-memory reference storage drivers. Useful for tests and for running
//! the engine without real durability; never use in production — a process
//! restart loses everything.

use std::collections::HashMap;

use async_trait::async_trait;
use mimic_core::{
    ColdStorage, ColdStorageError, DocumentId, HotStorage, HotStorageError, StoredSnapshot,
    Version, WalEntry, WalVersionGapError,
};
use parking_lot::Mutex;

/// Cold storage backed by a `HashMap` guarded by a single lock. Safe for
/// concurrent use across document ids, as the contract requires.
#[derive(Default)]
pub struct InMemoryColdStorage {
    snapshots: Mutex<HashMap<DocumentId, StoredSnapshot>>,
}

impl InMemoryColdStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ColdStorage for InMemoryColdStorage {
    async fn load(&self, id: &DocumentId) -> Result<Option<StoredSnapshot>, ColdStorageError> {
        Ok(self.snapshots.lock().get(id).cloned())
    }

    async fn save(&self, id: &DocumentId, snapshot: &StoredSnapshot) -> Result<(), ColdStorageError> {
        self.snapshots.lock().insert(id.clone(), snapshot.clone());
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> Result<(), ColdStorageError> {
        self.snapshots.lock().remove(id);
        Ok(())
    }
}

/// Hot storage backed by a per-document `Vec<WalEntry>`, kept in version
/// order by construction (every entry is appended, never inserted).
#[derive(Default)]
pub struct InMemoryHotStorage {
    logs: Mutex<HashMap<DocumentId, Vec<WalEntry>>>,
}

impl InMemoryHotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn last_version(logs: &HashMap<DocumentId, Vec<WalEntry>>, id: &DocumentId) -> Option<Version> {
        logs.get(id).and_then(|entries| entries.last()).map(|e| e.version)
    }
}

#[async_trait]
impl HotStorage for InMemoryHotStorage {
    async fn append(&self, id: &DocumentId, entry: &WalEntry) -> Result<(), HotStorageError> {
        self.logs.lock().entry(id.clone()).or_default().push(entry.clone());
        Ok(())
    }

    async fn append_with_check(
        &self,
        id: &DocumentId,
        entry: &WalEntry,
        expected_version: Version,
    ) -> Result<(), HotStorageError> {
        let mut logs = self.logs.lock();
        let actual_previous = Self::last_version(&logs, id);
        let expected_previous = expected_version.saturating_sub(1);
        let previous_ok = match actual_previous {
            Some(last) => last == expected_previous,
            None => expected_previous == 0 && expected_version >= 1,
        };
        if !previous_ok {
            return Err(WalVersionGapError {
                document_id: id.clone(),
                expected_previous,
                actual_previous,
            }
            .into());
        }
        logs.entry(id.clone()).or_default().push(entry.clone());
        Ok(())
    }

    async fn get_entries(
        &self,
        id: &DocumentId,
        since_version: Version,
    ) -> Result<Vec<WalEntry>, HotStorageError> {
        Ok(self
            .logs
            .lock()
            .get(id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.version > since_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn truncate(&self, id: &DocumentId, up_to_version: Version) -> Result<(), HotStorageError> {
        if let Some(entries) = self.logs.lock().get_mut(id) {
            entries.retain(|e| e.version > up_to_version);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_core::Transaction;

    fn entry(version: Version) -> WalEntry {
        WalEntry {
            transaction: Transaction {
                id: mimic_core::TransactionId::new(format!("t{version}")),
                ops: vec![],
                timestamp: 0,
            },
            version,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn append_with_check_rejects_version_gap() {
        let storage = InMemoryHotStorage::new();
        let id = DocumentId::parse("doc-1").unwrap();
        storage.append_with_check(&id, &entry(1), 1).await.unwrap();
        let err = storage.append_with_check(&id, &entry(3), 3).await.unwrap_err();
        assert!(matches!(err, HotStorageError::VersionGap(_)));
    }

    #[tokio::test]
    async fn truncate_removes_entries_at_or_below_version() {
        let storage = InMemoryHotStorage::new();
        let id = DocumentId::parse("doc-1").unwrap();
        storage.append(&id, &entry(1)).await.unwrap();
        storage.append(&id, &entry(2)).await.unwrap();
        storage.append(&id, &entry(3)).await.unwrap();
        storage.truncate(&id, 2).await.unwrap();
        let remaining = storage.get_entries(&id, 0).await.unwrap();
        assert_eq!(remaining.iter().map(|e| e.version).collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn cold_storage_load_is_consistent_with_prior_save() {
        let storage = InMemoryColdStorage::new();
        let id = DocumentId::parse("doc-1").unwrap();
        let snapshot = StoredSnapshot::new(serde_json::json!({"a": 1}), 5, 1000);
        storage.save(&id, &snapshot).await.unwrap();
        let loaded = storage.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 5);
    }
}
