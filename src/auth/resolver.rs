//! Maps verified claims to a directory identity.

use std::sync::Arc;

use super::Claims;
use crate::directory::{DirectoryError, UserDirectory};
use crate::domain::Identity;
use crate::error::GatewayError;

/// Resolves claims to an [`Identity`] through the user directory.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    directory: Arc<dyn UserDirectory>,
}

impl IdentityResolver {
    /// Creates a resolver over the given directory.
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Looks up the user named by the claims' email.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownIdentity`] if no user matches and
    /// [`GatewayError::LookupUnavailable`] if the directory failed.
    pub async fn resolve(&self, claims: &Claims) -> Result<Identity, GatewayError> {
        match self.directory.find_user_by_email(&claims.email).await {
            Ok(Some(user)) => Ok(user.into()),
            Ok(None) => Err(GatewayError::UnknownIdentity(claims.email.clone())),
            Err(DirectoryError::Unavailable(reason)) => {
                Err(GatewayError::LookupUnavailable(reason))
            }
            Err(e @ DirectoryError::Malformed(_)) => Err(GatewayError::Internal(e.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod tests {
    use futures_util::FutureExt;
    use futures_util::future::BoxFuture;

    use super::*;
    use crate::directory::{InMemoryUserDirectory, UserRecord};
    use crate::domain::{Role, UserId};

    /// Directory whose backend is always down.
    #[derive(Debug)]
    pub(crate) struct DownDirectory;

    impl UserDirectory for DownDirectory {
        fn find_user_by_email<'a>(
            &'a self,
            _email: &'a str,
        ) -> BoxFuture<'a, Result<Option<UserRecord>, DirectoryError>> {
            async { Err(DirectoryError::Unavailable("connection refused".to_string())) }.boxed()
        }
    }

    fn claims(email: &str) -> Claims {
        Claims {
            sub: "x".to_string(),
            email: email.to_string(),
            role: Role::User,
            iat: 0,
            exp: 0,
        }
    }

    #[tokio::test]
    async fn known_user_resolves() {
        let directory = InMemoryUserDirectory::with_users([UserRecord {
            id: UserId::new(42),
            email: "alice@example.com".to_string(),
            name: "Alice".to_string(),
            role: Role::Admin,
        }]);
        let resolver = IdentityResolver::new(Arc::new(directory));
        let Ok(identity) = resolver.resolve(&claims("alice@example.com")).await else {
            panic!("alice should resolve");
        };
        assert_eq!(identity.user_id, UserId::new(42));
        assert_eq!(identity.role, Role::Admin);
    }

    #[tokio::test]
    async fn unknown_user_is_terminal() {
        let resolver = IdentityResolver::new(Arc::new(InMemoryUserDirectory::new()));
        let result = resolver.resolve(&claims("ghost@example.com")).await;
        let Err(err) = result else {
            panic!("ghost must not resolve");
        };
        assert!(matches!(err, GatewayError::UnknownIdentity(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn directory_outage_is_retryable() {
        let resolver = IdentityResolver::new(Arc::new(DownDirectory));
        let Err(err) = resolver.resolve(&claims("alice@example.com")).await else {
            panic!("outage must fail");
        };
        assert!(matches!(err, GatewayError::LookupUnavailable(_)));
        assert!(err.is_retryable());
    }
}
