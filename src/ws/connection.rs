//! WebSocket connection state machine.
//!
//! Handles a single upgraded socket: authenticates it through the gateway,
//! then runs the read/write loop that dispatches client commands and
//! forwards frames queued by the fanout router.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use super::messages::{WsCommand, WsMessage, WsMessageType};
use crate::auth::Handshake;
use crate::domain::{ConnectionHandle, ConnectionId, Outbound};
use crate::error::GatewayError;
use crate::gateway::{Gateway, Session};

/// Close frame reasons are limited to 123 bytes.
const MAX_CLOSE_REASON: usize = 123;

type WsSink = SplitSink<WebSocket, Message>;

/// Runs the lifecycle of one WebSocket connection.
///
/// - Authenticates the handshake, closing the socket with the error's close
///   code on failure.
/// - Sends a `session:ready` event once registered.
/// - Reads commands from the client and dispatches them.
/// - Forwards frames queued on the connection's outbound channel and
///   honours close requests, which take precedence over queued frames.
pub async fn run_connection(socket: WebSocket, handshake: Handshake, gateway: Arc<Gateway>) {
    let id = ConnectionId::new();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut session = match gateway.connect(id) {
        Ok(session) => session,
        Err(err) => {
            close_with(&mut ws_tx, err.close_code(), &err.to_string()).await;
            return;
        }
    };
    let (handle, mut outbound_rx) = ConnectionHandle::channel(gateway.outbound_buffer());

    let identity = {
        let auth = gateway.authenticate(&mut session, &handshake, handle);
        tokio::pin!(auth);
        loop {
            tokio::select! {
                result = &mut auth => match result {
                    Ok(identity) => break identity,
                    Err(err) => {
                        close_with(&mut ws_tx, err.close_code(), &err.to_string()).await;
                        return;
                    }
                },
                // Frames sent before authentication completes are ignored.
                msg = ws_rx.next() => match msg {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => {
                        tracing::debug!(connection_id = %id, "client left during authentication");
                        gateway.disconnect(id);
                        return;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    };

    let ready = WsMessage::event(
        "session:ready",
        serde_json::json!({ "connectionId": id, "user": identity }),
    );
    if ws_tx.send(Message::text(ready.to_json())).await.is_err() {
        gateway.disconnect(id);
        return;
    }

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &gateway, &session);
                        if ws_tx.send(Message::text(reply)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            // Close request or frame queued by the fanout router
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(Outbound::Event(event)) => {
                        let frame = WsMessage::outbound(&event).to_json();
                        if ws_tx.send(Message::text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close(reason)) => {
                        tracing::info!(connection_id = %id, reason = reason.as_str(), "closing connection");
                        close_with(&mut ws_tx, reason.close_code(), reason.as_str()).await;
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    gateway.disconnect(id);
    tracing::debug!(connection_id = %id, "ws connection closed");
}

/// Handles a text message from the client, returning the JSON reply.
fn handle_text_message(text: &str, gateway: &Gateway, session: &Session) -> String {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return WsMessage::error(
            String::new(),
            &GatewayError::InvalidRequest("malformed JSON".to_string()),
        )
        .to_json();
    };
    if msg.msg_type != WsMessageType::Command {
        return WsMessage::error(
            msg.id,
            &GatewayError::InvalidRequest("only command messages are accepted".to_string()),
        )
        .to_json();
    }
    let command = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(command) => command,
        Err(e) => {
            return WsMessage::error(
                msg.id,
                &GatewayError::InvalidRequest(format!("unknown command: {e}")),
            )
            .to_json();
        }
    };

    let reply = match command {
        WsCommand::Join { room } => gateway
            .join_room(session, &room)
            .map(|count| serde_json::json!({ "joined": room, "rooms": count })),
        WsCommand::Leave { room } => gateway
            .leave_room(session, &room)
            .map(|was_member| serde_json::json!({ "left": room, "wasMember": was_member })),
        WsCommand::Ping => Ok(serde_json::json!({ "pong": true })),
    };

    match reply {
        Ok(payload) => WsMessage::response(msg.id, payload),
        Err(err) => WsMessage::error(msg.id, &err),
    }
    .to_json()
}

async fn close_with(ws_tx: &mut WsSink, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: truncate_reason(reason).into(),
    };
    if let Err(e) = ws_tx.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "close frame not sent");
    }
}

fn truncate_reason(reason: &str) -> String {
    let mut out = String::with_capacity(MAX_CLOSE_REASON);
    for c in reason.chars() {
        if out.len() + c.len_utf8() > MAX_CLOSE_REASON {
            break;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use serde_json::Value;

    use super::*;
    use crate::auth::{Authenticator, TokenValidator};
    use crate::directory::{InMemoryUserDirectory, UserRecord};
    use crate::domain::{Role, UserId};
    use crate::gateway::GatewaySettings;

    async fn authenticated() -> (Gateway, Session) {
        let validator = TokenValidator::new(b"s", Duration::ZERO, Duration::from_secs(60));
        let record = UserRecord {
            id: UserId::new(7),
            email: "bob@example.com".to_string(),
            name: "bob".to_string(),
            role: Role::User,
        };
        let Ok(token) = validator.issue(&record.clone().into()) else {
            panic!("token should sign");
        };
        let authenticator = Authenticator::with_directory(
            validator,
            Arc::new(InMemoryUserDirectory::with_users([record])),
        );
        let gateway = Gateway::new(Arc::new(authenticator), GatewaySettings::default());
        let Ok(mut session) = gateway.connect(ConnectionId::new()) else {
            panic!("connect should succeed");
        };
        let (handle, _rx) = ConnectionHandle::channel(4);
        let handshake = Handshake {
            auth_token: Some(token),
            query_token: None,
        };
        let Ok(_) = gateway.authenticate(&mut session, &handshake, handle).await else {
            panic!("authentication should succeed");
        };
        (gateway, session)
    }

    fn reply(text: &str, gateway: &Gateway, session: &Session) -> Value {
        let Ok(value) = serde_json::from_str(&handle_text_message(text, gateway, session)) else {
            panic!("reply should be JSON");
        };
        value
    }

    #[tokio::test]
    async fn join_and_leave_rooms() {
        let (gateway, session) = authenticated().await;
        let joined = reply(
            r#"{"id":"a","type":"command","payload":{"command":"join","room":"order:7"}}"#,
            &gateway,
            &session,
        );
        assert_eq!(joined["type"], "response");
        assert_eq!(joined["id"], "a");
        assert_eq!(joined["payload"]["rooms"], 1);
        assert_eq!(gateway.rooms().members("order:7"), vec![session.id()]);

        let left = reply(
            r#"{"id":"b","type":"command","payload":{"command":"leave","room":"order:7"}}"#,
            &gateway,
            &session,
        );
        assert_eq!(left["payload"]["wasMember"], true);
        assert!(gateway.rooms().members("order:7").is_empty());
    }

    #[tokio::test]
    async fn ping_is_answered() {
        let (gateway, session) = authenticated().await;
        let pong = reply(
            r#"{"id":"p","type":"command","payload":{"command":"ping"}}"#,
            &gateway,
            &session,
        );
        assert_eq!(pong["payload"]["pong"], true);
    }

    #[tokio::test]
    async fn bad_input_yields_error_frames() {
        let (gateway, session) = authenticated().await;
        let malformed = reply("not json", &gateway, &session);
        assert_eq!(malformed["type"], "error");
        assert_eq!(malformed["payload"]["code"], 1004);

        let unknown = reply(
            r#"{"id":"x","type":"command","payload":{"command":"teleport"}}"#,
            &gateway,
            &session,
        );
        assert_eq!(unknown["type"], "error");

        let bad_room = reply(
            r#"{"id":"y","type":"command","payload":{"command":"join","room":"a b"}}"#,
            &gateway,
            &session,
        );
        assert_eq!(bad_room["type"], "error");
    }

    #[test]
    fn close_reason_is_bounded() {
        assert_eq!(truncate_reason("short"), "short");
        assert_eq!(truncate_reason(&"é".repeat(100)).len(), 122);
    }
}
