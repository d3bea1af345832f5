// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mimic-core: shared data model, ids, clock, and collaborator traits for
//! the Mimic document-sync engine.

pub mod auth;
pub mod clock;
pub mod id;
pub mod model;
pub mod schema;
pub mod storage;

pub use auth::{AuthProvider, AuthVerdict, Permission};
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::ConnectionId;
pub use model::{
    DocumentId, DocumentIdError, PresenceEntry, StoredSnapshot, Transaction, TransactionId,
    Version, WalEntry,
};
pub use schema::{EncodedTransaction, PresenceValidator, SchemaApplier, SchemaError};
pub use storage::{
    ColdStorage, ColdStorageError, HotStorage, HotStorageError, StorageOperation,
    WalVersionGapError,
};
