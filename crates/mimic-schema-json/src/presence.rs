// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Reference presence schema: accepts any JSON object, rejecting scalars
//! and arrays. Production deployments bring their own `PresenceValidator`
//! shaped to their cursor/selection payload.

use mimic_core::{PresenceValidator, SchemaError};
use serde_json::Value;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonObjectPresenceValidator;

impl JsonObjectPresenceValidator {
    pub fn new() -> Self {
        Self
    }
}

impl PresenceValidator for JsonObjectPresenceValidator {
    fn validate(&self, data: &Value) -> Result<(), SchemaError> {
        if data.is_object() {
            Ok(())
        } else {
            Err(SchemaError::new("presence data must be a JSON object"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_object() {
        let validator = JsonObjectPresenceValidator::new();
        assert!(validator.validate(&serde_json::json!({"cursor": 3})).is_ok());
    }

    #[test]
    fn rejects_scalar() {
        let validator = JsonObjectPresenceValidator::new();
        assert!(validator.validate(&serde_json::json!(3)).is_err());
    }
}
