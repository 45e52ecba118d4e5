//! Domain event ingress DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishEventRequest {
    /// Domain event name, e.g. `order.updated`.
    pub name: String,
    /// Event payload routed by the fanout table.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Response body for `POST /events` (202 Accepted).
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishEventResponse {
    /// Event name echoed from the request.
    pub name: String,
    /// Bus subscribers that received the event.
    pub receivers: usize,
}
