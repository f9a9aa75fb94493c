//! WebSocket chat channel
//!
//! One socket per participant. The handshake runs admission checks and
//! rejects with a distinct close code per reason; an accepted socket is
//! bridged to a `ChatSession` through an unbounded event channel so the
//! registry can push to it from any task.

use crate::service::app::AppState;
use crate::session::connection::{admit, Admission};
use crate::session::ChatSession;
use crate::types::{ClientEvent, RejectReason, ServerEvent};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn ws_chat_handler(
    ws: WebSocketUpgrade,
    Path(device_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, device_id, state))
}

fn reject_label(reason: &RejectReason) -> &'static str {
    match reason {
        RejectReason::UnknownParticipant => "unknown_participant",
        RejectReason::VerificationIncomplete => "verification_incomplete",
        RejectReason::AccessDenied(_) => "access_denied",
    }
}

async fn handle_socket(mut socket: WebSocket, device_id: String, state: Arc<AppState>) {
    let record = match admit(&state.accounts, &device_id).await {
        Admission::Granted(record) => record,
        Admission::Rejected(reason) => {
            info!(
                "Rejected connection for {}: {}",
                crate::utils::short_id(&device_id),
                reason.reason()
            );
            state
                .metrics
                .connections
                .rejected_handshakes_total
                .with_label_values(&[reject_label(&reason)])
                .inc();
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: reason.close_code(),
                    reason: reason.reason().into(),
                })))
                .await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let epoch = match state.registry.register_connection(&device_id, tx) {
        Ok(epoch) => epoch,
        Err(err) => {
            warn!("Failed to register connection: {}", err);
            return;
        }
    };

    state.metrics.connections.connections_total.inc();
    if let Ok(count) = state.registry.connection_count() {
        state
            .metrics
            .connections
            .active_connections
            .set(count as i64);
    }

    if let Err(err) = state.accounts.record_daily_login(&device_id).await {
        warn!("Failed to record daily login: {}", err);
    }

    let mut session = ChatSession::new(
        device_id.clone(),
        record.gender(),
        epoch,
        Arc::clone(&state.registry),
        Arc::clone(&state.store),
        Arc::clone(&state.engine),
        Arc::clone(&state.accounts),
        state.config().policy.clone(),
        Arc::clone(&state.metrics),
    );

    // Goes through the registry channel so it is ordered with every
    // later push.
    let _ = state.registry.send_to(
        &device_id,
        ServerEvent::Connected {
            karma: record.karma,
            nickname: record
                .nickname
                .clone()
                .unwrap_or_else(|| "Anonymous".to_string()),
        },
    );

    info!("Connected {}", crate::utils::short_id(&device_id));

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!("Failed to serialize outbound event: {}", err),
                },
                // Sender dropped: this connection was superseded
                None => {
                    debug!(
                        "Channel closed for {}; superseded",
                        crate::utils::short_id(&device_id)
                    );
                    break;
                }
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    dispatch(&mut session, &state, &device_id, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong/binary are ignored
                Some(Err(err)) => {
                    debug!("Socket error for {}: {}", crate::utils::short_id(&device_id), err);
                    break;
                }
            },
        }
    }

    if let Err(err) = session.disconnect().await {
        warn!("Disconnect cleanup failed: {}", err);
    }
}

/// Parse and run one inbound frame. Failures are reported as error
/// events; the channel stays open.
async fn dispatch(session: &mut ChatSession, state: &Arc<AppState>, device_id: &str, text: &str) {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => {
            if let Err(err) = session.handle_event(event).await {
                let _ = state.registry.send_to(
                    device_id,
                    ServerEvent::Error {
                        message: err.to_string(),
                    },
                );
            }
        }
        Err(_) => {
            let _ = state.registry.send_to(
                device_id,
                ServerEvent::Error {
                    message: "Invalid message format".to_string(),
                },
            );
        }
    }
}
