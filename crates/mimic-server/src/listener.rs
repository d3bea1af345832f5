// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Accept loop and WebSocket upgrade: one route,
//! `GET {basePath}/doc/{documentId}`. A plain `TcpListener::accept` loop
//! that spawns one task per connection and races accepts against a
//! shutdown signal, generalized from a length-prefixed IPC frame to an
//! HTTP→WebSocket upgrade.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{Callback, ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{self, StatusCode};
use tokio_util::sync::CancellationToken;

use mimic_core::{Clock, DocumentId};

use crate::connection::{handle_connection, ConnectionDeps};

/// Accept connections on `listener` until `shutdown` fires, dispatching
/// each to its own task. Never returns an error itself — a single bad
/// connection is logged and dropped.
pub async fn serve<C: Clock>(
    listener: TcpListener,
    base_path: String,
    deps: Arc<ConnectionDeps<C>>,
    shutdown: CancellationToken,
) {
    let prefix = format!("{}/doc/", base_path.trim_end_matches('/'));
    tracing::info!(%prefix, local_addr = ?listener.local_addr().ok(), "mimic-server listening");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("listener shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let deps = deps.clone();
                        let prefix = prefix.clone();
                        tokio::spawn(async move {
                            accept_one(stream, addr, &prefix, deps).await;
                        });
                    }
                    Err(error) => tracing::error!(%error, "tcp accept error"),
                }
            }
        }
    }
}

/// Perform the HTTP→WebSocket upgrade for one accepted socket, extracting
/// `documentId` from the path in the same handshake pass, then hand off to
/// [`handle_connection`]. Non-upgrade requests and a missing/empty document
/// id are rejected with HTTP 400 before any WebSocket state exists.
async fn accept_one<C: Clock>(
    stream: TcpStream,
    addr: SocketAddr,
    prefix: &str,
    deps: Arc<ConnectionDeps<C>>,
) {
    let document_id_slot: Arc<Mutex<Option<DocumentId>>> = Arc::new(Mutex::new(None));
    let callback = PathCheck {
        prefix: prefix.to_string(),
        document_id: document_id_slot.clone(),
    };

    match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => {
            let Some(document_id) = document_id_slot.lock().take() else {
                tracing::warn!(%addr, "upgrade accepted without a resolved document id");
                return;
            };
            handle_connection(ws, document_id, deps).await;
        }
        Err(error) => {
            tracing::debug!(%addr, %error, "websocket upgrade rejected");
        }
    }
}

/// Handshake callback: validates the request path carries the configured
/// prefix plus a non-empty document id, stashing the parsed id for the
/// caller once the upgrade succeeds.
struct PathCheck {
    prefix: String,
    document_id: Arc<Mutex<Option<DocumentId>>>,
}

impl Callback for PathCheck {
    fn on_request(self, request: &Request, response: Response) -> Result<Response, ErrorResponse> {
        let path = request.uri().path();
        let raw_id = match path.strip_prefix(self.prefix.as_str()) {
            Some(id) if !id.is_empty() => id,
            _ => return Err(bad_request("Missing document ID in path")),
        };

        // Document ids are opaque, with no hierarchy; everything
        // after the route prefix is the id, embedded slashes included.
        match DocumentId::parse(raw_id) {
            Ok(id) => {
                *self.document_id.lock() = Some(id);
                Ok(response)
            }
            Err(_) => Err(bad_request("Missing document ID in path")),
        }
    }
}

fn bad_request(message: &str) -> ErrorResponse {
    http::Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(Some(message.to_string()))
        .unwrap_or_else(|_| {
            let mut fallback = http::Response::new(Some(message.to_string()));
            *fallback.status_mut() = StatusCode::BAD_REQUEST;
            fallback
        })
}
