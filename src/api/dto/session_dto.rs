//! Session DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::IdentityDto;

/// Response body for `GET /me`.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    /// Identity resolved from the bearer token.
    pub user: IdentityDto,
    /// Connection currently indexed for this user, if any.
    pub connection_id: Option<uuid::Uuid>,
}
