// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Reference JSON schema applier. Each operation is a JSON Merge Patch
//! fragment (RFC 7396) folded over the document state in order: a JSON
//! `null` at a key removes it, an object merges recursively, any other
//! value replaces outright.

use mimic_core::{EncodedTransaction, SchemaApplier, SchemaError, Transaction, TransactionId};
use serde_json::Value;

/// Folds a sequence of JSON Merge Patch operations over document state.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMergePatchApplier;

impl JsonMergePatchApplier {
    pub fn new() -> Self {
        Self
    }
}

fn merge(target: &Value, patch: &Value) -> Value {
    match patch {
        Value::Object(patch_map) => {
            let mut result = match target {
                Value::Object(target_map) => target_map.clone(),
                _ => serde_json::Map::new(),
            };
            for (key, value) in patch_map {
                if value.is_null() {
                    result.remove(key);
                } else {
                    let merged = merge(result.get(key).unwrap_or(&Value::Null), value);
                    result.insert(key.clone(), merged);
                }
            }
            Value::Object(result)
        }
        other => other.clone(),
    }
}

#[async_trait::async_trait]
impl SchemaApplier for JsonMergePatchApplier {
    fn validate(&self, _state: &Value, ops: &[Value]) -> Result<(), SchemaError> {
        for op in ops {
            if !op.is_object() {
                return Err(SchemaError::new(
                    "operation must be a JSON merge-patch object",
                ));
            }
        }
        Ok(())
    }

    fn apply(&self, state: &Value, ops: &[Value]) -> Result<Value, SchemaError> {
        let mut current = state.clone();
        for op in ops {
            current = merge(&current, op);
        }
        Ok(current)
    }

    fn encode(&self, transaction: &Transaction) -> Result<EncodedTransaction, SchemaError> {
        serde_json::to_value(transaction)
            .map(EncodedTransaction)
            .map_err(|e| SchemaError::new(e.to_string()))
    }

    fn decode(&self, encoded: &EncodedTransaction) -> Result<Transaction, SchemaError> {
        let id = encoded
            .0
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::new("encoded transaction missing string \"id\""))?;
        let ops = encoded
            .0
            .get("ops")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::new("encoded transaction missing array \"ops\""))?
            .clone();
        let timestamp = encoded
            .0
            .get("timestamp")
            .and_then(Value::as_u64)
            .ok_or_else(|| SchemaError::new("encoded transaction missing numeric \"timestamp\""))?;
        Ok(Transaction {
            id: TransactionId::new(id),
            ops,
            timestamp,
        })
    }
}
