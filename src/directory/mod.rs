//! User directory: the external user store consulted during authentication.
//!
//! The gateway only needs one query from the user store: find a user by
//! email. [`UserDirectory`] is that seam. Two implementations ship with the
//! crate: an in-memory directory for development and tests, and a
//! PostgreSQL directory reading the `"user"` table over `sqlx`.

pub mod memory;
pub mod postgres;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::domain::{Identity, Role, UserId};

pub use memory::InMemoryUserDirectory;
pub use postgres::PostgresUserDirectory;

/// User row as stored by the user service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Primary key.
    pub id: UserId,
    /// Unique account email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Authorization role.
    #[serde(default)]
    pub role: Role,
}

impl From<UserRecord> for Identity {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

/// Failure talking to the user store.
///
/// Distinct from "no such user", which is `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The store could not be reached or the query failed.
    #[error("user directory unavailable: {0}")]
    Unavailable(String),

    /// A row could not be decoded into a [`UserRecord`].
    #[error("malformed user record: {0}")]
    Malformed(String),
}

/// Read-only lookup into the user store.
///
/// Implementations must be cheap to share across connection tasks.
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    /// Finds a user by email.
    ///
    /// Resolves to `Ok(None)` when no user matches and to
    /// [`DirectoryError`] when the store itself failed.
    fn find_user_by_email<'a>(
        &'a self,
        email: &'a str,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, DirectoryError>>;
}
