//! Axum middleware for bearer authentication and role checks.
//!
//! Composed explicitly on the routes that need them:
//!
//! ```text
//! route ── require_auth (Identity extension) ── require_admin ── handler
//! ```

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::handshake::bearer_token;
use crate::app_state::AppState;
use crate::domain::Identity;
use crate::error::GatewayError;

/// Authenticates the `Authorization: Bearer` token and stores the resolved
/// [`Identity`] as a request extension.
///
/// # Errors
///
/// Rejects the request with the pipeline's [`GatewayError`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = bearer_token(req.headers()).map(str::to_string);
    let identity = state.authenticator.authenticate(token.as_deref()).await?;
    tracing::debug!(user_id = %identity.user_id, path = %req.uri().path(), "request authenticated");
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Requires the identity stored by [`require_auth`] to carry the admin role.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidCredential`] when no identity is present
/// and [`GatewayError::Forbidden`] when the role is insufficient.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, GatewayError> {
    let Some(identity) = req.extensions().get::<Identity>() else {
        return Err(GatewayError::InvalidCredential(
            "request not authenticated".to_string(),
        ));
    };
    if !identity.is_admin() {
        tracing::warn!(user_id = %identity.user_id, role = %identity.role, "admin route denied");
        return Err(GatewayError::Forbidden("admin role required".to_string()));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, StatusCode, header};
    use tower::ServiceExt;

    use crate::app_state::AppState;
    use crate::auth::{Authenticator, TokenValidator};
    use crate::directory::{InMemoryUserDirectory, UserRecord};
    use crate::domain::{EventBus, Role, UserId};
    use crate::gateway::{Gateway, GatewaySettings};

    fn user(id: i64, name: &str, role: Role) -> UserRecord {
        UserRecord {
            id: UserId::new(id),
            email: format!("{name}@example.com"),
            name: name.to_string(),
            role,
        }
    }

    fn app() -> (axum::Router, TokenValidator) {
        let validator = TokenValidator::new(b"mw", Duration::ZERO, Duration::from_secs(60));
        let directory = InMemoryUserDirectory::with_users([
            user(1, "alice", Role::User),
            user(2, "root", Role::Admin),
        ]);
        let authenticator = Arc::new(Authenticator::with_directory(
            validator.clone(),
            Arc::new(directory),
        ));
        let state = AppState {
            gateway: Arc::new(Gateway::new(
                Arc::clone(&authenticator),
                GatewaySettings::default(),
            )),
            authenticator,
            event_bus: EventBus::new(16),
        };
        (crate::build_app(state, Duration::from_secs(5)), validator)
    }

    fn token(validator: &TokenValidator, record: UserRecord) -> String {
        let Ok(token) = validator.issue(&record.into()) else {
            panic!("token should sign");
        };
        token
    }

    async fn status(
        app: axum::Router,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: &str,
    ) -> StatusCode {
        let mut builder = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let Ok(request) = builder.body(Body::from(body.to_string())) else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router is infallible");
        };
        response.status()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = app();
        assert_eq!(
            status(app, Method::GET, "/health", None, "").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_unauthorized() {
        let (app, _) = app();
        assert_eq!(
            status(app.clone(), Method::GET, "/api/v1/me", None, "").await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(app, Method::GET, "/api/v1/me", Some("garbage"), "").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn valid_token_reaches_me() {
        let (app, validator) = app();
        let token = token(&validator, user(1, "alice", Role::User));
        assert_eq!(
            status(app, Method::GET, "/api/v1/me", Some(&token), "").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn admin_routes_check_role() {
        let (app, validator) = app();
        let alice = token(&validator, user(1, "alice", Role::User));
        let root = token(&validator, user(2, "root", Role::Admin));
        assert_eq!(
            status(app.clone(), Method::GET, "/api/v1/connections", Some(&alice), "").await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(app.clone(), Method::GET, "/api/v1/connections", Some(&root), "").await,
            StatusCode::OK
        );
        assert_eq!(
            status(
                app.clone(),
                Method::POST,
                "/api/v1/events",
                Some(&root),
                r#"{"name":"user.created","payload":{"createdUser":{"id":3}}}"#,
            )
            .await,
            StatusCode::ACCEPTED
        );
        assert_eq!(
            status(app, Method::POST, "/api/v1/events", Some(&root), r#"{"name":" "}"#).await,
            StatusCode::BAD_REQUEST
        );
    }
}
