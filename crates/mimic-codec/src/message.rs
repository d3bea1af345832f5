// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Client/server message shapes. Transactions are always carried in their
//! canonicalized [`EncodedTransaction`] form — the codec never interprets
//! `ops`, it only carries the `serde_json::Value` the schema applier
//! produced.

use std::collections::HashMap;

use mimic_core::{EncodedTransaction, PresenceEntry, Version};
use serde::{Deserialize, Serialize};

/// One message sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Must precede all other message types; always allowed.
    #[serde(rename = "auth")]
    Auth { token: String },

    /// Always allowed, in any connection state.
    #[serde(rename = "ping")]
    Ping,

    /// Requires authentication and write permission.
    #[serde(rename = "submit")]
    Submit { transaction: EncodedTransaction },

    /// Requires authentication.
    #[serde(rename = "request_snapshot")]
    RequestSnapshot,

    /// Requires authentication, write permission, and presence enabled.
    #[serde(rename = "presence_set")]
    PresenceSet { data: serde_json::Value },

    /// Requires authentication.
    #[serde(rename = "presence_clear")]
    PresenceClear,
}

/// One message sent from the server to a client. Multi-word field names
/// are camelCase on the wire (`transactionId`, `selfId`, `userId`) while
/// the `type` discriminant stays snake_case, matching the client message
/// tags above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "auth_result", rename_all = "camelCase")]
    AuthResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        permission: Option<mimic_core::Permission>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "pong")]
    Pong,

    #[serde(rename = "snapshot")]
    Snapshot {
        state: serde_json::Value,
        version: Version,
    },

    #[serde(rename = "transaction")]
    Transaction {
        transaction: EncodedTransaction,
        version: Version,
    },

    #[serde(rename = "error", rename_all = "camelCase")]
    Error {
        transaction_id: String,
        reason: String,
    },

    #[serde(rename = "presence_snapshot", rename_all = "camelCase")]
    PresenceSnapshot {
        self_id: String,
        presences: HashMap<String, PresenceEntry>,
    },

    #[serde(rename = "presence_update", rename_all = "camelCase")]
    PresenceUpdate {
        id: String,
        data: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },

    #[serde(rename = "presence_remove")]
    PresenceRemove { id: String },

    /// Sent when the per-document broadcast channel dropped buffered
    /// transactions for this socket because it fell behind the
    /// bounded-channel slow-subscriber policy. The client is expected
    /// to follow up with `request_snapshot`.
    #[serde(rename = "subscriber_lagged")]
    SubscriberLagged { missed: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn auth_message_round_trips() {
        let msg = ClientMessage::Auth {
            token: "tok".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"auth","token":"tok"}"#);
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn ping_has_no_extra_fields() {
        let msg = ClientMessage::Ping;
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn auth_result_omits_absent_optionals() {
        let msg = ServerMessage::AuthResult {
            success: false,
            user_id: None,
            permission: None,
            error: Some("bad token".to_string()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"type":"auth_result","success":false,"error":"bad token"}"#
        );
    }

    #[test]
    fn submit_carries_opaque_encoded_transaction() {
        let msg = ClientMessage::Submit {
            transaction: EncodedTransaction(serde_json::json!({"id": "t1", "ops": []})),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "submit");
        assert_eq!(json["transaction"]["id"], "t1");
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let result: Result<ClientMessage, _> = serde_json::from_str(r#"{"type":"unknown"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn error_message_uses_camel_case_transaction_id() {
        let msg = ServerMessage::Error {
            transaction_id: "dup".to_string(),
            reason: "Transaction has already been processed".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["transactionId"], "dup");
        assert!(json.get("transaction_id").is_none());
    }

    #[test]
    fn presence_snapshot_uses_camel_case_self_id() {
        let msg = ServerMessage::PresenceSnapshot {
            self_id: "conn-1".to_string(),
            presences: HashMap::new(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["selfId"], "conn-1");
    }

    #[test]
    fn auth_result_uses_camel_case_user_id_when_present() {
        let msg = ServerMessage::AuthResult {
            success: true,
            user_id: Some("alice".to_string()),
            permission: Some(mimic_core::Permission::Write),
            error: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["userId"], "alice");
    }

    proptest! {
        #[test]
        fn auth_message_round_trips_for_any_token(token in ".*") {
            let msg = ClientMessage::Auth { token: token.clone() };
            let json = serde_json::to_string(&msg).unwrap();
            let back: ClientMessage = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, msg);
        }

        #[test]
        fn presence_set_round_trips_for_any_string_payload(data in ".*") {
            let msg = ClientMessage::PresenceSet { data: serde_json::Value::String(data) };
            let json = serde_json::to_string(&msg).unwrap();
            let back: ClientMessage = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, msg);
        }

        #[test]
        fn error_message_round_trips_and_stays_camel_case(
            transaction_id in "[a-zA-Z0-9_-]{0,32}",
            reason in ".*",
        ) {
            let msg = ServerMessage::Error {
                transaction_id: transaction_id.clone(),
                reason: reason.clone(),
            };
            let json = serde_json::to_value(&msg).unwrap();
            prop_assert_eq!(json["transactionId"].as_str().unwrap(), transaction_id.as_str());
            let back: ServerMessage = serde_json::from_value(json).unwrap();
            prop_assert_eq!(back, msg);
        }
    }
}
