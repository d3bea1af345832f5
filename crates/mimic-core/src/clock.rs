// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Injectable clock, so snapshot-interval and idle-eviction timing can be
//! driven deterministically in tests instead of waiting on real wall time.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Source of monotonic instants and wall-clock milliseconds. Implementations
/// must be cheap to clone and safe to share across the registry's background
/// workers and per-document runtimes.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> u64;
}

/// Real wall-clock time.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock whose `now()`/`epoch_ms()` are fixed until explicitly advanced,
/// for deterministic tests of snapshot-interval and idle-eviction timing.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
    epoch_ms: Arc<Mutex<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
            epoch_ms: Arc::new(Mutex::new(0)),
        }
    }

    /// Advance both the monotonic instant and the epoch clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock();
        *current += duration;
        let mut epoch = self.epoch_ms.lock();
        *epoch += duration.as_millis() as u64;
    }

    pub fn set(&self, instant: Instant) {
        *self.current.lock() = instant;
    }

    pub fn set_epoch_ms(&self, ms: u64) {
        *self.epoch_ms.lock() = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn epoch_ms(&self) -> u64 {
        *self.epoch_ms.lock()
    }
}
