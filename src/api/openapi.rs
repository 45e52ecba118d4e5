//! OpenAPI document for the REST surface.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{connections, events, session, system};

/// Generated OpenAPI description served by Swagger UI.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "relay-gateway",
        description = "Authenticated WebSocket gateway. Connect to `/ws` with a bearer token; events are pushed as JSON envelopes."
    ),
    paths(
        system::health_handler,
        session::me,
        connections::list_connections,
        events::publish_event,
    ),
    modifiers(&BearerScheme),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Session", description = "Identity of the caller"),
        (name = "Admin", description = "Registry inspection and event ingress"),
    )
)]
pub struct ApiDoc;

#[derive(Debug)]
struct BearerScheme;

impl Modify for BearerScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_routes_and_scheme() {
        let doc = ApiDoc::openapi();
        for path in ["/health", "/api/v1/me", "/api/v1/connections", "/api/v1/events"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let has_bearer = doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer"));
        assert!(has_bearer);
    }
}
