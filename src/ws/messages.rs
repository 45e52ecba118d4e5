//! WebSocket message types: envelope, commands, and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::OutboundEvent;
use crate::error::GatewayError;

/// Top-level WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// Event name, set on [`WsMessageType::Event`] frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// ISO-8601 timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client pushed event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Join a named room such as `order:7`.
    Join {
        /// Room name.
        room: String,
    },
    /// Leave a room.
    Leave {
        /// Room name.
        room: String,
    },
    /// Liveness probe answered with `{"pong": true}`.
    Ping,
}

impl WsMessage {
    /// Event frame with a fresh server-generated id.
    #[must_use]
    pub fn event(name: &str, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: WsMessageType::Event,
            event: Some(name.to_string()),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Event frame for a fanned-out event.
    #[must_use]
    pub fn outbound(event: &OutboundEvent) -> Self {
        Self::event(&event.event, event.payload.clone())
    }

    /// Response to the command with the given id.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Response,
            event: None,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Error reply carrying the same `{code, message}` body as HTTP errors.
    #[must_use]
    pub fn error(id: String, err: &GatewayError) -> Self {
        Self {
            id,
            msg_type: WsMessageType::Error,
            event: None,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "code": err.error_code(),
                "message": err.to_string(),
            }),
        }
    }

    /// Serializes the envelope to a JSON text frame.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
