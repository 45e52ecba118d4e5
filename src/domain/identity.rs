//! Resolved user context attached to an authenticated connection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Numeric user identifier from the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Wraps a raw directory id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Authorization role carried by a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account.
    #[default]
    User,
    /// Administrative account; may inspect the registry and publish events.
    Admin,
}

impl Role {
    /// Returns the role as its lowercase wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// User context attached to a connection after authentication.
///
/// Derived from the user directory, never from token claims alone. The
/// registry stores it by value and offers no way to replace it, so an
/// attached identity stays fixed for the lifetime of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Directory user id.
    pub user_id: UserId,
    /// Account email, the lookup key used by the resolver.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Authorization role.
    pub role: Role,
}

impl Identity {
    /// Returns `true` if the identity carries the [`Role::Admin`] role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let Ok(json) = serde_json::to_string(&Role::Admin) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"admin\"");
    }

    #[test]
    fn user_id_is_transparent() {
        let Ok(id) = serde_json::from_str::<UserId>("42") else {
            panic!("deserialization failed");
        };
        assert_eq!(id, UserId::new(42));
        assert_eq!(id.to_string(), "42");
    }
}
