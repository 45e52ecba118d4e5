//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::domain::EventBus;
use crate::gateway::Gateway;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection lifecycle controller.
    pub gateway: Arc<Gateway>,
    /// Authentication pipeline shared by HTTP routes and the gateway.
    pub authenticator: Arc<Authenticator>,
    /// Event bus consumed by the fanout router.
    pub event_bus: EventBus,
}
