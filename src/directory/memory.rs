//! In-memory user directory.

use std::collections::HashMap;
use std::path::Path;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::RwLock;

use super::{DirectoryError, UserDirectory, UserRecord};

/// User directory held in process memory, keyed by lowercase email.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory pre-populated with the given users.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = users
            .into_iter()
            .map(|user| (user.email.to_ascii_lowercase(), user))
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// Loads users from a JSON array file.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Unavailable`] if the file cannot be read
    /// and [`DirectoryError::Malformed`] if it is not a JSON array of users.
    pub async fn from_seed_file(path: &Path) -> Result<Self, DirectoryError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("{}: {e}", path.display())))?;
        let users: Vec<UserRecord> =
            serde_json::from_str(&raw).map_err(|e| DirectoryError::Malformed(e.to_string()))?;
        tracing::info!(path = %path.display(), users = users.len(), "user directory seeded");
        Ok(Self::with_users(users))
    }

    /// Inserts or replaces a user.
    pub async fn insert(&self, user: UserRecord) {
        self.users
            .write()
            .await
            .insert(user.email.to_ascii_lowercase(), user);
    }

    /// Number of users held.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns `true` if the directory holds no users.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_user_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, DirectoryError>> {
        async move {
            let users = self.users.read().await;
            Ok(users.get(&email.to_ascii_lowercase()).cloned())
        }
        .boxed()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Role, UserId};

    fn alice() -> UserRecord {
        UserRecord {
            id: UserId::new(42),
            email: "Alice@Example.com".to_string(),
            name: "Alice".to_string(),
            role: Role::Admin,
        }
    }

    #[tokio::test]
    async fn lookup_ignores_email_case() {
        let directory = InMemoryUserDirectory::with_users([alice()]);
        let Ok(found) = directory.find_user_by_email("alice@example.com").await else {
            panic!("lookup failed");
        };
        assert_eq!(found.map(|u| u.id), Some(UserId::new(42)));
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let directory = InMemoryUserDirectory::new();
        assert!(directory.is_empty().await);
        let Ok(found) = directory.find_user_by_email("nobody@example.com").await else {
            panic!("lookup failed");
        };
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn insert_replaces_existing() {
        let directory = InMemoryUserDirectory::with_users([alice()]);
        let mut renamed = alice();
        renamed.name = "Alice B.".to_string();
        directory.insert(renamed).await;
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn seed_file_loads_users() {
        let path = std::env::temp_dir().join(format!("relay-seed-{}.json", uuid::Uuid::new_v4()));
        let body = r#"[{"id": 1, "email": "bob@example.com", "name": "Bob"}]"#;
        if tokio::fs::write(&path, body).await.is_err() {
            panic!("could not write seed file");
        }

        let loaded = InMemoryUserDirectory::from_seed_file(&path).await;
        let _ = tokio::fs::remove_file(&path).await;
        let Ok(directory) = loaded else {
            panic!("seed file should load");
        };
        let Ok(Some(bob)) = directory.find_user_by_email("bob@example.com").await else {
            panic!("bob should be present");
        };
        assert_eq!(bob.role, Role::User);
    }

    #[tokio::test]
    async fn malformed_seed_file_is_rejected() {
        let path = std::env::temp_dir().join(format!("relay-seed-{}.json", uuid::Uuid::new_v4()));
        if tokio::fs::write(&path, "{not json").await.is_err() {
            panic!("could not write seed file");
        }
        let loaded = InMemoryUserDirectory::from_seed_file(&path).await;
        let _ = tokio::fs::remove_file(&path).await;
        assert!(matches!(loaded, Err(DirectoryError::Malformed(_))));
    }
}
