// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Counters for `documentsActive`, `documentsRestored`, `documentsCreated`,
//! `documentsEvicted`. Deliberately a plain struct of atomics rather than a
//! metrics-exporter crate — enough to assert the invariants in tests
//! without pulling in an exporter this workspace has no other use for.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    documents_active: AtomicU64,
    documents_restored: AtomicU64,
    documents_created: AtomicU64,
    documents_evicted: AtomicU64,
}

/// Point-in-time read of [`Metrics`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub documents_active: u64,
    pub documents_restored: u64,
    pub documents_created: u64,
    pub documents_evicted: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_restored(&self) {
        self.documents_restored.fetch_add(1, Ordering::Relaxed);
        self.documents_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_created(&self) {
        self.documents_created.fetch_add(1, Ordering::Relaxed);
        self.documents_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self) {
        self.documents_evicted.fetch_add(1, Ordering::Relaxed);
        self.documents_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_active: self.documents_active.load(Ordering::Relaxed),
            documents_restored: self.documents_restored.load(Ordering::Relaxed),
            documents_created: self.documents_created.load(Ordering::Relaxed),
            documents_evicted: self.documents_evicted.load(Ordering::Relaxed),
        }
    }
}
