//! Session endpoint: who am I.

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::api::dto::{IdentityDto, MeResponse};
use crate::app_state::AppState;
use crate::domain::Identity;
use crate::error::ErrorResponse;

/// `GET /me` — Identity behind the bearer token.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "Session",
    summary = "Current identity",
    description = "Authenticates the bearer token through the same pipeline as WebSocket connections and returns the resolved identity, plus the connection currently indexed for the user.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Resolved identity", body = MeResponse),
        (status = 401, description = "Missing, invalid, or unknown credential", body = ErrorResponse),
        (status = 503, description = "User directory unavailable", body = ErrorResponse),
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Json<MeResponse> {
    let connection_id = state
        .gateway
        .registry()
        .lookup_by_user(identity.user_id)
        .map(|c| *c.id.as_uuid());
    Json(MeResponse {
        user: IdentityDto::from(&identity),
        connection_id,
    })
}

/// Session routes; require authentication.
pub fn routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}
