// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mimic-codec: the tagged-JSON wire protocol for client/server messages.

pub mod frame;
pub mod message;

pub use frame::{decode_client_message, encode_server_message, Frame, ProtocolError};
pub use message::{ClientMessage, ServerMessage};
