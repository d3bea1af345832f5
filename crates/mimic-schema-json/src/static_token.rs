// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Reference auth provider: a fixed table of tokens to verdicts, for demos
//! and tests. Production deployments bring their own `AuthProvider`.

use std::collections::HashMap;

use async_trait::async_trait;
use mimic_core::{AuthProvider, AuthVerdict, Permission};

#[derive(Clone)]
struct Entry {
    user_id: Option<String>,
    permission: Permission,
}

/// Looks tokens up in a fixed table built at construction time. Unknown
/// tokens are rejected with `"unknown token"`.
#[derive(Default, Clone)]
pub struct StaticTokenAuthProvider {
    tokens: HashMap<String, Entry>,
}

impl StaticTokenAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token that authenticates as `user_id` with `permission`.
    pub fn with_token(
        mut self,
        token: impl Into<String>,
        user_id: Option<String>,
        permission: Permission,
    ) -> Self {
        self.tokens.insert(token.into(), Entry { user_id, permission });
        self
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuthProvider {
    async fn authenticate(&self, token: &str) -> AuthVerdict {
        match self.tokens.get(token) {
            Some(entry) => AuthVerdict::Accepted {
                user_id: entry.user_id.clone(),
                permission: entry.permission,
            },
            None => AuthVerdict::Rejected {
                reason: "unknown token".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_token_is_accepted_with_its_permission() {
        let provider = StaticTokenAuthProvider::new().with_token(
            "tok",
            Some("alice".to_string()),
            Permission::Write,
        );
        let verdict = provider.authenticate("tok").await;
        assert_eq!(
            verdict,
            AuthVerdict::Accepted {
                user_id: Some("alice".to_string()),
                permission: Permission::Write,
            }
        );
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let provider = StaticTokenAuthProvider::new();
        let verdict = provider.authenticate("nope").await;
        assert!(matches!(verdict, AuthVerdict::Rejected { .. }));
    }

    #[tokio::test]
    async fn re_authenticating_same_token_is_deterministic() {
        let provider = StaticTokenAuthProvider::new().with_token("tok", None, Permission::Read);
        let first = provider.authenticate("tok").await;
        let second = provider.authenticate("tok").await;
        assert_eq!(first, second);
    }
}
