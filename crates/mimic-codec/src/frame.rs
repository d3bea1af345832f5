// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! One JSON value per WebSocket text frame; no batching.

use crate::message::{ClientMessage, ServerMessage};

/// A single WebSocket text frame, pre- or post- JSON (de)serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(pub String);

impl Frame {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Frame {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Distinguishes a malformed-frame parse failure (non-fatal; the connection
/// stays open) from a transport-level I/O failure forwarded by the socket
/// layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to parse frame: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode one text frame into a [`ClientMessage`]. A [`ProtocolError::Parse`]
/// here terminates handling of *this* message only — the caller decides
/// whether to close the socket.
pub fn decode_client_message(frame: &Frame) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(frame.as_str())?)
}

/// Encode a [`ServerMessage`] into the text frame sent to a client.
pub fn encode_server_message(message: &ServerMessage) -> Result<Frame, ProtocolError> {
    Ok(Frame(serde_json::to_string(message)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ClientMessage;

    #[test]
    fn decode_rejects_garbage_without_closing() {
        let frame = Frame("not json".to_string());
        let err = decode_client_message(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::Parse(_)));
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let msg = ServerMessage::Pong;
        let frame = encode_server_message(&msg).unwrap();
        assert_eq!(frame.as_str(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn decode_accepts_valid_client_message() {
        let frame = Frame(r#"{"type":"ping"}"#.to_string());
        let msg = decode_client_message(&frame).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
    }
}
