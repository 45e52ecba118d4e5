//! Domain event ingress.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{PublishEventRequest, PublishEventResponse};
use crate::app_state::AppState;
use crate::domain::DomainEvent;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /events` — Publish a domain event on the bus.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the event name is empty.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Admin",
    summary = "Publish a domain event",
    description = "Publishes a domain event on the event bus. The fanout router delivers it according to its route: broadcast, per-user, or per-room. Requires the admin role.",
    security(("bearer" = [])),
    request_body = PublishEventRequest,
    responses(
        (status = 202, description = "Event accepted", body = PublishEventResponse),
        (status = 400, description = "Invalid event", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    )
)]
pub async fn publish_event(
    State(state): State<AppState>,
    Json(req): Json<PublishEventRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "event name must not be empty".to_string(),
        ));
    }
    let receivers = state
        .event_bus
        .publish(DomainEvent::new(name, req.payload));

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishEventResponse {
            name: name.to_string(),
            receivers,
        }),
    ))
}

/// Event routes; require the admin role.
pub fn routes() -> Router<AppState> {
    Router::new().route("/events", post(publish_event))
}
