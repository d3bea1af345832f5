// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! A single-document write-ahead log file: newline-delimited JSON
//! [`WalEntry`] records, opened once per document and kept resident for the
//! life of the process. Corruption (a non-JSON or non-UTF-8 trailing line,
//! e.g. from a torn write during a crash) is handled by preserving every
//! valid entry before the break and rotating the damaged file aside rather
//! than failing the open.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use mimic_core::{Version, WalEntry};

const MAX_BACKUPS: u32 = 3;

/// One document's on-disk WAL. Not `Send`-shared directly; callers hold one
/// behind a lock (see [`crate::file::FileHotStorage`]).
pub struct DocumentWal {
    path: PathBuf,
    entries: Vec<WalEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum WalOpenError {
    #[error("failed to open WAL at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentWal {
    /// Open (creating if absent) the WAL file at `path`. Any valid entries
    /// before the first corrupt line are kept; the raw file on disk is
    /// rewritten to contain only those entries, and the previous contents
    /// are rotated to `<path>.bak`, bumping any existing backups to
    /// `.bak.2`/`.bak.3` and evicting whatever was in `.bak.3`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WalOpenError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| WalOpenError::Io {
                path: path.clone(),
                source,
            })?;
        }

        let (entries, corrupted) = Self::read_valid_prefix(&path)?;

        if corrupted {
            tracing::warn!(path = %path.display(), "WAL corruption detected, rotating backup");
            Self::rotate_backups(&path).map_err(|source| WalOpenError::Io {
                path: path.clone(),
                source,
            })?;
            Self::rewrite(&path, &entries).map_err(|source| WalOpenError::Io {
                path: path.clone(),
                source,
            })?;
        }

        Ok(Self { path, entries })
    }

    /// Returns `(valid entries read so far, whether a corrupt line was hit)`.
    /// Never errors on malformed content — only on I/O failure opening the
    /// file.
    fn read_valid_prefix(path: &Path) -> Result<(Vec<WalEntry>, bool), WalOpenError> {
        if !path.exists() {
            return Ok((Vec::new(), false));
        }
        let file = File::open(path).map_err(|source| WalOpenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        let mut corrupted = false;
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(_) => {
                    corrupted = true;
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(_) => {
                    corrupted = true;
                    break;
                }
            }
        }
        Ok((entries, corrupted))
    }

    fn rotate_backups(path: &Path) -> std::io::Result<()> {
        let evict = Self::backup_path(path, MAX_BACKUPS + 1);
        if evict.exists() {
            std::fs::remove_file(&evict)?;
        }
        for generation in (1..=MAX_BACKUPS).rev() {
            let from = Self::backup_path(path, generation);
            if from.exists() {
                let to = Self::backup_path(path, generation + 1);
                std::fs::rename(from, to)?;
            }
        }
        if path.exists() {
            std::fs::rename(path, Self::backup_path(path, 1))?;
        }
        Ok(())
    }

    fn backup_path(path: &Path, generation: u32) -> PathBuf {
        if generation <= 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{generation}"))
        }
    }

    fn rewrite(path: &Path, entries: &[WalEntry]) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        for entry in entries {
            let line = serde_json::to_string(entry).expect("WalEntry always serializes");
            writeln!(file, "{line}")?;
        }
        file.flush()
    }

    pub fn entries_after(&self, since_version: Version) -> Vec<WalEntry> {
        self.entries
            .iter()
            .filter(|e| e.version > since_version)
            .cloned()
            .collect()
    }

    pub fn last_version(&self) -> Option<Version> {
        self.entries.last().map(|e| e.version)
    }

    pub fn append(&mut self, entry: &WalEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(entry).expect("WalEntry always serializes");
        writeln!(file, "{line}")?;
        file.flush()?;
        self.entries.push(entry.clone());
        Ok(())
    }

    pub fn truncate_to_after(&mut self, up_to_version: Version) -> std::io::Result<()> {
        self.entries.retain(|e| e.version > up_to_version);
        Self::rewrite(&self.path, &self.entries)
    }
}
