// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Authentication is a pluggable predicate on opaque tokens: the engine
//! never interprets a token itself, only the verdict an injected
//! [`AuthProvider`] returns.

use async_trait::async_trait;

use crate::model::Permission;

/// Outcome of authenticating one opaque token. No semantics beyond
/// determinism on the same token within a session are required;
/// re-authentication mid-connection is allowed and expected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthVerdict {
    Accepted {
        user_id: Option<String>,
        permission: Permission,
    },
    Rejected {
        reason: String,
    },
}

/// Maps an opaque token to an [`AuthVerdict`]. Implementations are free to
/// call out to an external identity service; the connection handler awaits
/// the result before transitioning out of `New`.
#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    async fn authenticate(&self, token: &str) -> AuthVerdict;
}
