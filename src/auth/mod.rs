//! Authentication: token verification, identity resolution, and the
//! pipeline shared by the WebSocket handshake and HTTP routes.
//!
//! ```text
//! Handshake / Authorization header
//!     │
//!     ├── require_token      → InvalidCredential if missing
//!     ├── TokenValidator     → Claims | InvalidCredential
//!     └── IdentityResolver   → Identity | UnknownIdentity | LookupUnavailable
//! ```

pub mod handshake;
pub mod middleware;
pub mod resolver;
pub mod token;

use std::sync::Arc;

use crate::directory::UserDirectory;
use crate::domain::Identity;
use crate::error::GatewayError;

pub use handshake::Handshake;
pub use resolver::IdentityResolver;
pub use token::{Claims, TokenValidator};

/// The single authentication pipeline.
///
/// Every WebSocket connection and every protected HTTP request goes through
/// [`Authenticator::authenticate`]; there is no second, fallback path.
#[derive(Debug, Clone)]
pub struct Authenticator {
    validator: TokenValidator,
    resolver: IdentityResolver,
}

impl Authenticator {
    /// Creates a pipeline from its two stages.
    #[must_use]
    pub fn new(validator: TokenValidator, resolver: IdentityResolver) -> Self {
        Self {
            validator,
            resolver,
        }
    }

    /// Convenience constructor over a directory.
    #[must_use]
    pub fn with_directory(validator: TokenValidator, directory: Arc<dyn UserDirectory>) -> Self {
        Self::new(validator, IdentityResolver::new(directory))
    }

    /// The token stage, exposed for issuing tokens.
    #[must_use]
    pub const fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Runs the pipeline on an optional bearer token.
    ///
    /// # Errors
    ///
    /// Returns the first stage rejection: [`GatewayError::InvalidCredential`],
    /// [`GatewayError::UnknownIdentity`], or
    /// [`GatewayError::LookupUnavailable`].
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, GatewayError> {
        let token = require_token(token)?;
        let claims = self.validator.verify(token)?;
        self.resolver.resolve(&claims).await
    }
}

fn require_token(token: Option<&str>) -> Result<&str, GatewayError> {
    token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::InvalidCredential("no token provided".to_string()))
}
