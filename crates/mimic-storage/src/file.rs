// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! File-backed reference storage drivers. Cold storage is one JSON file per
//! document under `snapshots/`; hot storage is one newline-JSON WAL file per
//! document under `wal/` (see [`crate::wal::DocumentWal`]). Blocking file
//! I/O runs on `tokio::task::spawn_blocking` so the async trait methods
//! never stall the runtime's worker threads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use mimic_core::{
    ColdStorage, ColdStorageError, DocumentId, HotStorage, HotStorageError, StorageOperation,
    StoredSnapshot, Version, WalEntry, WalVersionGapError,
};
use parking_lot::Mutex;

use crate::wal::DocumentWal;

fn boxed_io_error(source: std::io::Error) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(source)
}

/// Cold storage that writes one JSON file per document under `base_dir`.
pub struct FileColdStorage {
    base_dir: PathBuf,
}

impl FileColdStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, id: &DocumentId) -> PathBuf {
        self.base_dir.join(format!("{}.snapshot.json", sanitize(id.as_str())))
    }
}

#[async_trait]
impl ColdStorage for FileColdStorage {
    async fn load(&self, id: &DocumentId) -> Result<Option<StoredSnapshot>, ColdStorageError> {
        let path = self.path_for(id);
        let id = id.clone();
        tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Ok(None);
            }
            let bytes = std::fs::read(&path).map_err(|e| ColdStorageError {
                document_id: id.clone(),
                operation: StorageOperation::Load,
                cause: boxed_io_error(e),
            })?;
            let snapshot: StoredSnapshot =
                serde_json::from_slice(&bytes).map_err(|e| ColdStorageError {
                    document_id: id.clone(),
                    operation: StorageOperation::Load,
                    cause: Box::new(e),
                })?;
            Ok(Some(snapshot))
        })
        .await
        .expect("spawn_blocking join (cold load)")
    }

    async fn save(&self, id: &DocumentId, snapshot: &StoredSnapshot) -> Result<(), ColdStorageError> {
        std::fs::create_dir_all(&self.base_dir).map_err(|e| ColdStorageError {
            document_id: id.clone(),
            operation: StorageOperation::Save,
            cause: boxed_io_error(e),
        })?;
        let path = self.path_for(id);
        let id = id.clone();
        let snapshot = snapshot.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = serde_json::to_vec(&snapshot).map_err(|e| ColdStorageError {
                document_id: id.clone(),
                operation: StorageOperation::Save,
                cause: Box::new(e),
            })?;
            // Write to a temp file then rename, so a save failure never
            // leaves a half-written snapshot in place of a good one.
            let tmp_path = path.with_extension("snapshot.json.tmp");
            std::fs::write(&tmp_path, &bytes).map_err(|e| ColdStorageError {
                document_id: id.clone(),
                operation: StorageOperation::Save,
                cause: boxed_io_error(e),
            })?;
            std::fs::rename(&tmp_path, &path).map_err(|e| ColdStorageError {
                document_id: id.clone(),
                operation: StorageOperation::Save,
                cause: boxed_io_error(e),
            })
        })
        .await
        .expect("spawn_blocking join (cold save)")
    }

    async fn delete(&self, id: &DocumentId) -> Result<(), ColdStorageError> {
        let path = self.path_for(id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| ColdStorageError {
                document_id: id.clone(),
                operation: StorageOperation::Delete,
                cause: boxed_io_error(e),
            })?;
        }
        Ok(())
    }
}

/// Hot storage that keeps one [`DocumentWal`] per document, lazily opened
/// and kept resident under an outer lock for the document map plus a
/// per-document lock for the WAL itself.
pub struct FileHotStorage {
    base_dir: PathBuf,
    wals: Mutex<HashMap<DocumentId, Arc<Mutex<DocumentWal>>>>,
}

impl FileHotStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            wals: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, id: &DocumentId) -> PathBuf {
        self.base_dir.join(format!("{}.wal", sanitize(id.as_str())))
    }

    fn wal_for(&self, id: &DocumentId) -> Result<Arc<Mutex<DocumentWal>>, std::io::Error> {
        if let Some(wal) = self.wals.lock().get(id) {
            return Ok(wal.clone());
        }
        let wal = DocumentWal::open(self.path_for(id))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        let wal = Arc::new(Mutex::new(wal));
        self.wals.lock().insert(id.clone(), wal.clone());
        Ok(wal)
    }
}

#[async_trait]
impl HotStorage for FileHotStorage {
    async fn append(&self, id: &DocumentId, entry: &WalEntry) -> Result<(), HotStorageError> {
        let wal = self.wal_for(id).map_err(|e| HotStorageError::Io {
            document_id: id.clone(),
            operation: StorageOperation::Append,
            cause: boxed_io_error(e),
        })?;
        let entry = entry.clone();
        let id_for_err = id.clone();
        tokio::task::spawn_blocking(move || wal.lock().append(&entry))
            .await
            .expect("spawn_blocking join (wal append)")
            .map_err(|e| HotStorageError::Io {
                document_id: id_for_err,
                operation: StorageOperation::Append,
                cause: boxed_io_error(e),
            })
    }

    async fn append_with_check(
        &self,
        id: &DocumentId,
        entry: &WalEntry,
        expected_version: Version,
    ) -> Result<(), HotStorageError> {
        let wal = self.wal_for(id).map_err(|e| HotStorageError::Io {
            document_id: id.clone(),
            operation: StorageOperation::AppendWithCheck,
            cause: boxed_io_error(e),
        })?;
        let entry = entry.clone();
        let id_for_err = id.clone();
        let id_for_gap = id.clone();
        tokio::task::spawn_blocking(move || {
            let mut wal = wal.lock();
            let actual_previous = wal.last_version();
            let expected_previous = expected_version.saturating_sub(1);
            let previous_ok = match actual_previous {
                Some(last) => last == expected_previous,
                None => expected_previous == 0 && expected_version >= 1,
            };
            if !previous_ok {
                return Err(WalGapOrIo::Gap(WalVersionGapError {
                    document_id: id_for_gap,
                    expected_previous,
                    actual_previous,
                }));
            }
            wal.append(&entry).map_err(WalGapOrIo::Io)
        })
        .await
        .expect("spawn_blocking join (wal append_with_check)")
        .map_err(|e| match e {
            WalGapOrIo::Gap(gap) => HotStorageError::VersionGap(gap),
            WalGapOrIo::Io(io) => HotStorageError::Io {
                document_id: id_for_err,
                operation: StorageOperation::AppendWithCheck,
                cause: boxed_io_error(io),
            },
        })
    }

    async fn get_entries(
        &self,
        id: &DocumentId,
        since_version: Version,
    ) -> Result<Vec<WalEntry>, HotStorageError> {
        let wal = self.wal_for(id).map_err(|e| HotStorageError::Io {
            document_id: id.clone(),
            operation: StorageOperation::GetEntries,
            cause: boxed_io_error(e),
        })?;
        Ok(tokio::task::spawn_blocking(move || wal.lock().entries_after(since_version))
            .await
            .expect("spawn_blocking join (wal get_entries)"))
    }

    async fn truncate(&self, id: &DocumentId, up_to_version: Version) -> Result<(), HotStorageError> {
        let wal = self.wal_for(id).map_err(|e| HotStorageError::Io {
            document_id: id.clone(),
            operation: StorageOperation::Truncate,
            cause: boxed_io_error(e),
        })?;
        let id_for_err = id.clone();
        tokio::task::spawn_blocking(move || wal.lock().truncate_to_after(up_to_version))
            .await
            .expect("spawn_blocking join (wal truncate)")
            .map_err(|e| HotStorageError::Io {
                document_id: id_for_err,
                operation: StorageOperation::Truncate,
                cause: boxed_io_error(e),
            })
    }
}

enum WalGapOrIo {
    Gap(WalVersionGapError),
    Io(std::io::Error),
}

/// Document ids are opaque and may contain path separators; flatten them to
/// a safe file-name component instead of trusting the caller.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_core::{Transaction, TransactionId};
    use tempfile::tempdir;

    fn entry(version: Version) -> WalEntry {
        WalEntry {
            transaction: Transaction {
                id: TransactionId::new(format!("t{version}")),
                ops: vec![],
                timestamp: 0,
            },
            version,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn cold_storage_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let storage = FileColdStorage::new(dir.path());
        let id = DocumentId::parse("doc/with slashes").unwrap();
        let snapshot = StoredSnapshot::new(serde_json::json!({"count": 3}), 3, 1000);
        storage.save(&id, &snapshot).await.unwrap();
        let loaded = storage.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 3);
        assert_eq!(loaded.state, serde_json::json!({"count": 3}));
    }

    #[tokio::test]
    async fn cold_storage_load_of_missing_document_is_none() {
        let dir = tempdir().unwrap();
        let storage = FileColdStorage::new(dir.path());
        let id = DocumentId::parse("missing").unwrap();
        assert!(storage.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hot_storage_append_then_get_entries() {
        let dir = tempdir().unwrap();
        let storage = FileHotStorage::new(dir.path());
        let id = DocumentId::parse("doc-1").unwrap();
        storage.append(&id, &entry(1)).await.unwrap();
        storage.append(&id, &entry(2)).await.unwrap();
        let entries = storage.get_entries(&id, 0).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn hot_storage_truncate_then_get_entries_excludes_truncated() {
        let dir = tempdir().unwrap();
        let storage = FileHotStorage::new(dir.path());
        let id = DocumentId::parse("doc-1").unwrap();
        storage.append(&id, &entry(1)).await.unwrap();
        storage.append(&id, &entry(2)).await.unwrap();
        storage.truncate(&id, 1).await.unwrap();
        let entries = storage.get_entries(&id, 0).await.unwrap();
        assert_eq!(entries.iter().map(|e| e.version).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn hot_storage_append_with_check_rejects_gap() {
        let dir = tempdir().unwrap();
        let storage = FileHotStorage::new(dir.path());
        let id = DocumentId::parse("doc-1").unwrap();
        storage.append_with_check(&id, &entry(1), 1).await.unwrap();
        let err = storage
            .append_with_check(&id, &entry(5), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, HotStorageError::VersionGap(_)));
    }

    #[tokio::test]
    async fn hot_storage_reopens_surviving_process_restart() {
        let dir = tempdir().unwrap();
        let id = DocumentId::parse("doc-1").unwrap();
        {
            let storage = FileHotStorage::new(dir.path());
            storage.append(&id, &entry(1)).await.unwrap();
            storage.append(&id, &entry(2)).await.unwrap();
        }
        let storage = FileHotStorage::new(dir.path());
        let entries = storage.get_entries(&id, 0).await.unwrap();
        assert_eq!(entries.len(), 2);
    }
}
