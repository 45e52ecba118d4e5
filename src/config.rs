//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Parsing goes through a key lookup
//! closure so it can be exercised without touching the process
//! environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration failure at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value found.
        value: String,
    },
}

/// What happens to an older connection when the same user connects again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SupersedePolicy {
    /// Ask the superseded connection to close.
    #[default]
    Evict,
    /// Leave it open; it is only reachable by connection id and rooms.
    Keep,
}

impl FromStr for SupersedePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "evict" => Ok(Self::Evict),
            "keep" => Ok(Self::Keep),
            _ => Err(()),
        }
    }
}

/// Which user directory backs identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryConfig {
    /// PostgreSQL `"user"` table.
    Postgres {
        /// Connection string.
        url: String,
        /// Pool size.
        max_connections: u32,
        /// Timeout for acquiring a pooled connection.
        connect_timeout: Duration,
    },
    /// In-memory directory, optionally seeded from a JSON file.
    Memory {
        /// Path of a JSON array of users.
        seed_file: Option<PathBuf>,
    },
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Shared HS256 secret for bearer tokens.
    pub jwt_secret: String,

    /// Clock skew tolerated on token expiry.
    pub jwt_leeway: Duration,

    /// Lifetime of tokens issued by the gateway.
    pub token_ttl: Duration,

    /// Upper bound on a WebSocket handshake (verify + resolve).
    pub auth_timeout: Duration,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Per-connection outbound queue depth.
    pub outbound_buffer: usize,

    /// Maximum rooms a single connection may join.
    pub max_rooms_per_connection: usize,

    /// Policy for a user's superseded connection.
    pub supersede_policy: SupersedePolicy,

    /// User directory backend.
    pub directory: DirectoryConfig,

    /// Request timeout for REST routes.
    pub http_timeout: Duration,

    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `JWT_SECRET` is not set and
    /// [`ConfigError::Invalid`] if `LISTEN_ADDR` or `SUPERSEDE_POLICY`
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Numeric settings fall back to their defaults when missing or
    /// unparsable.
    ///
    /// # Errors
    ///
    /// Same as [`GatewayConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_raw = lookup("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let listen_addr = listen_raw.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            key: "LISTEN_ADDR",
            value: listen_raw.clone(),
        })?;

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let supersede_policy = match lookup("SUPERSEDE_POLICY") {
            None => SupersedePolicy::default(),
            Some(raw) => raw.parse::<SupersedePolicy>().map_err(|()| ConfigError::Invalid {
                key: "SUPERSEDE_POLICY",
                value: raw,
            })?,
        };

        let directory = match lookup("DATABASE_URL").filter(|s| !s.is_empty()) {
            Some(url) => DirectoryConfig::Postgres {
                url,
                max_connections: parse_key(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
                connect_timeout: Duration::from_secs(parse_key(
                    &lookup,
                    "DATABASE_CONNECT_TIMEOUT_SECS",
                    5,
                )),
            },
            None => DirectoryConfig::Memory {
                seed_file: lookup("USER_SEED_FILE").map(PathBuf::from),
            },
        };

        Ok(Self {
            listen_addr,
            jwt_secret,
            jwt_leeway: Duration::from_secs(parse_key(&lookup, "JWT_LEEWAY_SECS", 30)),
            token_ttl: Duration::from_secs(parse_key(&lookup, "TOKEN_TTL_SECS", 3600)),
            auth_timeout: Duration::from_millis(parse_key(&lookup, "AUTH_TIMEOUT_MS", 5_000)),
            event_bus_capacity: parse_key(&lookup, "EVENT_BUS_CAPACITY", 10_000),
            outbound_buffer: parse_key(&lookup, "OUTBOUND_BUFFER", 256),
            max_rooms_per_connection: parse_key(&lookup, "MAX_ROOMS_PER_CONNECTION", 64),
            supersede_policy,
            directory,
            http_timeout: Duration::from_secs(parse_key(&lookup, "HTTP_TIMEOUT_SECS", 30)),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }
}

/// Parses a setting as `T`, returning `default` on missing or invalid
/// values.
fn parse_key<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
