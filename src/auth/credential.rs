// src/auth/credential.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::AuthError;
use super::jwt;

/// Temporary AWS keys minted by the identity pool.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsKeys {
    pub access_key_id: String,
    pub secret_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsKeys")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    /// Bearer or identity token
    Token(String),
    /// Raw browser cookie header value
    Cookie(String),
    Aws(AwsKeys),
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Token(t) => write!(f, "Token({} chars)", t.len()),
            Secret::Cookie(c) => write!(f, "Cookie({} chars)", c.len()),
            Secret::Aws(keys) => keys.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOrigin {
    /// Pasted by a human from the browser; cannot be renewed by us
    Manual,
    /// Minted by an exchange operation
    Refreshed,
}

impl fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialOrigin::Manual => write!(f, "manual"),
            CredentialOrigin::Refreshed => write!(f, "refreshed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub secret: Secret,
    pub expires_at: DateTime<Utc>,
    /// Whether `expires_at` came from the credential itself or from a fixed TTL
    pub expiry_is_explicit: bool,
    pub origin: CredentialOrigin,
}

impl Credential {
    pub fn new(
        name: impl Into<String>,
        secret: Secret,
        expires_at: DateTime<Utc>,
        origin: CredentialOrigin,
    ) -> Self {
        Self {
            name: name.into(),
            secret,
            expires_at,
            expiry_is_explicit: true,
            origin,
        }
    }

    /// Manually supplied secret whose lifetime is unknown: assume `ttl` from now.
    pub fn manual(name: impl Into<String>, secret: Secret, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            secret,
            expires_at: Utc::now() + ttl,
            expiry_is_explicit: false,
            origin: CredentialOrigin::Manual,
        }
    }

    /// Token credential whose expiry is read from its `exp` claim, falling
    /// back to `fallback_ttl` from now when the token carries none.
    pub fn from_jwt(
        name: impl Into<String>,
        token: impl Into<String>,
        origin: CredentialOrigin,
        fallback_ttl: Duration,
    ) -> Self {
        let token = token.into();
        let (expires_at, explicit) = match jwt::token_expiry(&token) {
            Some(exp) => (exp, true),
            None => (Utc::now() + fallback_ttl, false),
        };

        Self {
            name: name.into(),
            secret: Secret::Token(token),
            expires_at,
            expiry_is_explicit: explicit,
            origin,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expired, or close enough to expiry that it should be renewed first.
    pub fn needs_refresh_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now + skew >= self.expires_at
    }

    pub fn token(&self) -> Result<&str, AuthError> {
        match &self.secret {
            Secret::Token(t) => Ok(t),
            _ => Err(self.wrong_kind("token")),
        }
    }

    pub fn cookie(&self) -> Result<&str, AuthError> {
        match &self.secret {
            Secret::Cookie(c) => Ok(c),
            _ => Err(self.wrong_kind("cookie")),
        }
    }

    pub fn aws_keys(&self) -> Result<&AwsKeys, AuthError> {
        match &self.secret {
            Secret::Aws(keys) => Ok(keys),
            _ => Err(self.wrong_kind("AWS key set")),
        }
    }

    fn wrong_kind(&self, expected: &'static str) -> AuthError {
        AuthError::WrongSecretKind {
            name: self.name.clone(),
            expected,
        }
    }
}
