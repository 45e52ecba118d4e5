//! Credential carrier extracted from an upgrade or HTTP request.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

/// Credential sources presented when a connection is opened.
///
/// `auth_token` is the handshake `auth.token` field (carried over plain
/// WebSocket as an `Authorization: Bearer` header); `query_token` is the
/// `token` query parameter. The auth field is tried first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    /// Token from the auth field.
    pub auth_token: Option<String>,
    /// Token from the `token` query parameter.
    pub query_token: Option<String>,
}

impl Handshake {
    /// Builds a handshake from request headers and the optional `token`
    /// query parameter.
    #[must_use]
    pub fn from_parts(headers: &HeaderMap, query_token: Option<String>) -> Self {
        Self {
            auth_token: bearer_token(headers).map(str::to_string),
            query_token,
        }
    }

    /// Returns the first non-empty token, auth field first.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        [self.auth_token.as_deref(), self.query_token.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|t| !t.is_empty())
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}
