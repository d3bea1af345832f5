// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Mimic Contributors

//! Per-socket connection handler: the three-state machine
//! (`New → Authenticated(read|write) → Closed`), the per-message
//! dispatch table, transaction/presence fan-out, and heartbeat
//! keepalive. One task per accepted WebSocket, spawned by
//! [`crate::listener`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use mimic_codec::{decode_client_message, encode_server_message, ClientMessage, Frame, ServerMessage};
use mimic_core::{
    AuthProvider, AuthVerdict, Clock, ConnectionId, DocumentId, Permission, PresenceValidator,
    SchemaApplier,
};
use mimic_engine::runtime::TransactionBroadcast;
use mimic_engine::presence::PresenceEvent;
use mimic_engine::DocumentRegistry;

/// Collaborators a connection handler needs beyond the document registry
/// itself: authentication, the presence schema (if the
/// deployment opted in), and the schema applier's `decode` side of the
/// wire round-trip.
pub struct ConnectionDeps<C: Clock> {
    pub registry: Arc<DocumentRegistry<C>>,
    pub auth: Arc<dyn AuthProvider>,
    pub schema: Arc<dyn SchemaApplier>,
    pub presence_validator: Option<Arc<dyn PresenceValidator>>,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

/// New → Authenticated(read|write). There is no explicit `Closed` value;
/// closing is modeled by returning from [`handle_connection`].
struct ConnState {
    permission: Option<Permission>,
    user_id: Option<String>,
}

impl ConnState {
    fn new() -> Self {
        Self {
            permission: None,
            user_id: None,
        }
    }

    fn is_authenticated(&self) -> bool {
        self.permission.is_some()
    }
}

fn reason_for_submit_error(error: &mimic_engine::SubmitError) -> String {
    error.to_string()
}

/// Drive one accepted WebSocket end to end until the socket closes or a
/// fatal transport error occurs. `document_id` has already been
/// extracted from the upgrade request path by the listener.
pub async fn handle_connection<C, S>(
    ws: WebSocketStream<S>,
    document_id: DocumentId,
    deps: Arc<ConnectionDeps<C>>,
) where
    C: Clock,
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let handle = match deps.registry.get_or_create(&document_id).await {
        Ok(handle) => handle,
        Err(error) => {
            tracing::warn!(document_id = %document_id, %error, "failed to materialize document for new connection");
            return;
        }
    };

    let connection_id = ConnectionId::new();
    let mut state = ConnState::new();
    let (mut sink, mut stream) = ws.split();

    let mut tx_rx: Option<broadcast::Receiver<TransactionBroadcast>> = None;
    let mut presence_rx: Option<broadcast::Receiver<PresenceEvent>> = None;

    let mut heartbeat = interval(deps.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_pong = Instant::now();

    let presence_enabled = deps.presence_validator.is_some();

    tracing::info!(document_id = %document_id, connection_id = %connection_id, "connection opened");

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle.touch(std::time::Instant::now());
                        let frame = Frame(text.to_string());
                        match decode_client_message(&frame) {
                            Ok(message) => {
                                if !dispatch(
                                    message,
                                    &mut state,
                                    &connection_id,
                                    &handle,
                                    &deps,
                                    &mut sink,
                                    &mut tx_rx,
                                    &mut presence_rx,
                                ).await {
                                    break;
                                }
                            }
                            Err(error) => {
                                tracing::debug!(document_id = %document_id, %error, "dropping unparseable frame");
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        tracing::debug!(document_id = %document_id, %error, "websocket transport error");
                        break;
                    }
                }
            }

            received = async {
                match &mut tx_rx {
                    Some(rx) => Some(rx.recv().await),
                    None => std::future::pending().await,
                }
            } => {
                match received {
                    Some(Ok(broadcast)) => {
                        let message = ServerMessage::Transaction {
                            transaction: broadcast.transaction,
                            version: broadcast.version,
                        };
                        if send(&mut sink, &message).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(broadcast::error::RecvError::Lagged(missed))) => {
                        if send(&mut sink, &ServerMessage::SubscriberLagged { missed }).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(broadcast::error::RecvError::Closed)) | None => break,
                }
            }

            received = async {
                match &mut presence_rx {
                    Some(rx) => Some(rx.recv().await),
                    None => std::future::pending().await,
                }
            } => {
                match received {
                    Some(Ok(PresenceEvent::Update { id, entry })) if id != connection_id => {
                        let message = ServerMessage::PresenceUpdate {
                            id: id.to_string(),
                            data: entry.data,
                            user_id: entry.user_id,
                        };
                        if send(&mut sink, &message).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(PresenceEvent::Remove { id })) if id != connection_id => {
                        if send(&mut sink, &ServerMessage::PresenceRemove { id: id.to_string() }).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {} // self-echo, suppressed on the presence stream only
                    Some(Err(broadcast::error::RecvError::Lagged(_))) => {}
                    Some(Err(broadcast::error::RecvError::Closed)) | None => break,
                }
            }

            _ = heartbeat.tick() => {
                if last_pong.elapsed() >= deps.heartbeat_timeout {
                    tracing::debug!(document_id = %document_id, connection_id = %connection_id, "heartbeat timeout, closing connection");
                    break;
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Teardown: cancel fan-out (the receivers are dropped
    // with this function's stack frame), remove presence, log and
    // swallow any failure.
    if presence_enabled && state.is_authenticated() {
        handle.presence_remove(connection_id);
    }
    let _ = sink.send(Message::Close(None)).await;
    tracing::info!(document_id = %document_id, connection_id = %connection_id, "connection closed");
}

async fn send<S>(
    sink: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    message: &ServerMessage,
) -> Result<(), ()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = match encode_server_message(message) {
        Ok(frame) => frame,
        Err(error) => {
            tracing::error!(%error, "failed to encode outgoing server message");
            return Err(());
        }
    };
    sink.send(Message::Text(frame.as_str().to_string().into()))
        .await
        .map_err(|_| ())
}

/// Dispatch one decoded [`ClientMessage`] per its message type.
/// Returns `false` when the connection should close.
#[allow(clippy::too_many_arguments)]
async fn dispatch<C, S>(
    message: ClientMessage,
    state: &mut ConnState,
    connection_id: &ConnectionId,
    handle: &mimic_engine::DocumentHandle,
    deps: &Arc<ConnectionDeps<C>>,
    sink: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
    tx_rx: &mut Option<broadcast::Receiver<TransactionBroadcast>>,
    presence_rx: &mut Option<broadcast::Receiver<PresenceEvent>>,
) -> bool
where
    C: Clock,
    S: AsyncRead + AsyncWrite + Unpin,
{
    match message {
        ClientMessage::Ping => {
            send(sink, &ServerMessage::Pong).await.is_ok()
        }

        ClientMessage::Auth { token } => {
            match deps.auth.authenticate(&token).await {
                AuthVerdict::Accepted { user_id, permission } => {
                    state.permission = Some(permission);
                    state.user_id = user_id.clone();

                    *tx_rx = Some(handle.subscribe_transactions());
                    let presence_enabled = deps.presence_validator.is_some();
                    if presence_enabled {
                        *presence_rx = Some(handle.subscribe_presence());
                    }

                    let ok = send(
                        sink,
                        &ServerMessage::AuthResult {
                            success: true,
                            user_id,
                            permission: Some(permission),
                            error: None,
                        },
                    )
                    .await
                    .is_ok();
                    if !ok {
                        return false;
                    }

                    let (value, version) = handle.get_snapshot();
                    if send(sink, &ServerMessage::Snapshot { state: value, version }).await.is_err() {
                        return false;
                    }

                    if presence_enabled {
                        let presences: HashMap<String, mimic_core::PresenceEntry> = handle
                            .presence_snapshot()
                            .into_iter()
                            .map(|(id, entry)| (id.to_string(), entry))
                            .collect();
                        if send(
                            sink,
                            &ServerMessage::PresenceSnapshot {
                                self_id: connection_id.to_string(),
                                presences,
                            },
                        )
                        .await
                        .is_err()
                        {
                            return false;
                        }
                    }
                    true
                }
                AuthVerdict::Rejected { reason } => send(
                    sink,
                    &ServerMessage::AuthResult {
                        success: false,
                        user_id: None,
                        permission: None,
                        error: Some(reason),
                    },
                )
                .await
                .is_ok(),
            }
        }

        ClientMessage::Submit { transaction } => {
            match state.permission {
                None => send(
                    sink,
                    &ServerMessage::Error {
                        transaction_id: submit_transaction_id(&transaction),
                        reason: "not authenticated".to_string(),
                    },
                )
                .await
                .is_ok(),
                Some(Permission::Read) => send(
                    sink,
                    &ServerMessage::Error {
                        transaction_id: submit_transaction_id(&transaction),
                        reason: "write permission required".to_string(),
                    },
                )
                .await
                .is_ok(),
                Some(Permission::Write) => match deps.schema.decode(&transaction) {
                    Ok(tx) => {
                        let transaction_id = tx.id.as_str().to_string();
                        match handle.submit(tx).await {
                            Ok(_version) => true,
                            Err(error) => send(
                                sink,
                                &ServerMessage::Error {
                                    transaction_id,
                                    reason: reason_for_submit_error(&error),
                                },
                            )
                            .await
                            .is_ok(),
                        }
                    }
                    Err(error) => send(
                        sink,
                        &ServerMessage::Error {
                            transaction_id: submit_transaction_id(&transaction),
                            reason: error.0,
                        },
                    )
                    .await
                    .is_ok(),
                },
            }
        }

        ClientMessage::RequestSnapshot => {
            if state.is_authenticated() {
                let (value, version) = handle.get_snapshot();
                send(sink, &ServerMessage::Snapshot { state: value, version }).await.is_ok()
            } else {
                true // ignored silently
            }
        }

        ClientMessage::PresenceSet { data } => {
            match state.permission {
                Some(Permission::Write) => {
                    if let Some(validator) = &deps.presence_validator {
                        match validator.validate(&data) {
                            Ok(()) => {
                                handle.presence_set(
                                    *connection_id,
                                    mimic_core::PresenceEntry {
                                        data,
                                        user_id: state.user_id.clone(),
                                    },
                                );
                            }
                            Err(error) => {
                                tracing::warn!(%error, "presence_set rejected by presence schema");
                            }
                        }
                    }
                    true
                }
                Some(Permission::Read) => {
                    tracing::debug!("presence_set ignored: read-only connection");
                    true
                }
                None => true, // ignored
            }
        }

        ClientMessage::PresenceClear => {
            if state.is_authenticated() {
                handle.presence_remove(*connection_id);
            }
            true
        }
    }
}

fn submit_transaction_id(transaction: &mimic_core::EncodedTransaction) -> String {
    transaction
        .0
        .get("id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}
