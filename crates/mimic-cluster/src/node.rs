// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Cluster node identity.

use std::fmt;

/// Identifies one node in the cluster. Opaque to the partitioner and
/// transport; a real deployment would typically use a hostname or a
/// consistent-hash-ring member id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
