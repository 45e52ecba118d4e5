//! HS256 bearer token verification and issuing.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::domain::{Identity, Role};
use crate::error::GatewayError;

/// Verified fields carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the account's display name).
    pub sub: String,
    /// Account email; the identity lookup key.
    pub email: String,
    /// Role at signing time. Informational; the directory record wins.
    /// Parsed case-insensitively; unknown values fall back to the default.
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Role,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

fn lenient_role<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_default())
}

/// Stateless verifier for HS256 tokens signed with a shared secret.
///
/// Verification is a pure function of the token, the secret, and the
/// clock; nothing is cached between calls.
#[derive(Clone)]
pub struct TokenValidator {
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("leeway_secs", &self.validation.leeway)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Creates a validator for the given secret.
    ///
    /// `leeway` is the clock skew tolerated on `exp`; `ttl` is the lifetime
    /// of tokens produced by [`TokenValidator::issue`].
    #[must_use]
    pub fn new(secret: &[u8], leeway: Duration, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway.as_secs();
        validation.set_required_spec_claims(&["exp"]);
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            encoding_key: EncodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Verifies a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidCredential`] if the token is
    /// malformed, expired, or carries a bad signature.
    pub fn verify(&self, token: &str) -> Result<Claims, GatewayError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "token expired".to_string(),
                    ErrorKind::InvalidSignature => "bad signature".to_string(),
                    _ => format!("malformed token: {e}"),
                };
                GatewayError::InvalidCredential(reason)
            })
    }

    /// Signs a token for the given identity, valid for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if signing fails.
    pub fn issue(&self, identity: &Identity) -> Result<String, GatewayError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        self.sign(&Claims {
            sub: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            iat: now,
            exp: now.saturating_add(ttl),
        })
    }

    /// Signs arbitrary claims without checking them.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if signing fails.
    pub fn sign(&self, claims: &Claims) -> Result<String, GatewayError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| GatewayError::Internal(format!("token signing failed: {e}")))
    }
}
