// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! The document data model: identifiers, versions, transactions, snapshots,
//! WAL entries and presence entries.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonically increasing per-document version counter. Starts at 0 for a
/// fresh document; a successful transaction produces `previous + 1`.
pub type Version = u64;

/// Opaque, non-empty document identifier supplied in the URL path. Treated
/// as a flat key with no hierarchy, so it stays a plain `String` rather than
/// the fixed-capacity [`crate::id::IdBuf`] — client-supplied ids have no
/// length bound we control.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Parse a path segment into a document id, rejecting the empty string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, DocumentIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(DocumentIdError::Empty);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({:?})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a path segment cannot be parsed into a [`DocumentId`].
#[derive(Debug, thiserror::Error)]
pub enum DocumentIdError {
    #[error("Missing document ID in path")]
    Empty,
}

/// Client-supplied transaction id, used for server-side deduplication. May
/// be any non-empty string (clients typically assign a UUID); no length
/// bound is enforced beyond what the transport frame allows.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TransactionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({:?})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A client-submitted batch of opaque operations. `ops` is interpreted only
/// by the injected [`crate::schema::SchemaApplier`]; the engine and codec
/// never look inside it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub ops: Vec<serde_json::Value>,
    /// Milliseconds since epoch, client-supplied at submit time.
    pub timestamp: u64,
}

/// Permission level attached to an authenticated connection. `Write` implies
/// `Read`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn can_write(self) -> bool {
        matches!(self, Permission::Write)
    }
}

/// Current schema version for [`StoredSnapshot`]. Reserved for forward
/// migrations; no prior version has ever existed.
pub const SCHEMA_VERSION: u32 = 1;

/// A persisted whole-document snapshot, one per document id in Cold
/// Storage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub state: serde_json::Value,
    pub version: Version,
    pub schema_version: u32,
    /// Milliseconds since epoch.
    pub saved_at: u64,
}

impl StoredSnapshot {
    pub fn new(state: serde_json::Value, version: Version, saved_at: u64) -> Self {
        Self {
            state,
            version,
            schema_version: SCHEMA_VERSION,
            saved_at,
        }
    }
}

/// One entry in a document's write-ahead log. `version` is the version that
/// results from applying `transaction`; entries for a given document form a
/// strictly increasing sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalEntry {
    pub transaction: Transaction,
    pub version: Version,
    /// Milliseconds since epoch, server-assigned at append time.
    pub timestamp: u64,
}

/// Ephemeral per-connection presence data, schema-validated against an
/// optional presence schema. Exists only while the owning connection is
/// live.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn document_id_rejects_empty() {
        assert!(matches!(DocumentId::parse(""), Err(DocumentIdError::Empty)));
    }

    #[test]
    fn document_id_accepts_opaque_string() {
        let id = DocumentId::parse("abc/../weird").unwrap();
        assert_eq!(id.as_str(), "abc/../weird");
    }

    #[test]
    fn write_permission_implies_read() {
        assert!(Permission::Write.can_write());
        assert!(!Permission::Read.can_write());
    }

    #[test]
    fn stored_snapshot_defaults_schema_version_to_one() {
        let snap = StoredSnapshot::new(serde_json::json!({"a": 1}), 3, 1000);
        assert_eq!(snap.schema_version, 1);
    }

    proptest! {
        #[test]
        fn document_id_accepts_any_non_empty_string_unchanged(raw in ".+") {
            let id = DocumentId::parse(raw.clone()).unwrap();
            prop_assert_eq!(id.as_str(), raw.as_str());
        }

        #[test]
        fn transaction_id_round_trips_through_json(raw in ".*") {
            let id = TransactionId::new(raw.clone());
            let json = serde_json::to_string(&id).unwrap();
            let back: TransactionId = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, id);
            prop_assert_eq!(back.as_str(), raw.as_str());
        }
    }
}
