// src/auth/exchange.rs
use async_trait::async_trait;

use super::credential::Credential;
use super::error::AuthError;

/// Result of a successful exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub credential: Credential,
    /// New long-lived refresh secret, when the provider rotated it
    pub rotated_refresh: Option<String>,
}

impl ExchangeOutcome {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            rotated_refresh: None,
        }
    }

    pub fn with_rotation(mut self, refresh: Option<String>) -> Self {
        self.rotated_refresh = refresh;
        self
    }
}

/// One network round trip that turns a refresh secret into a fresh
/// short-lived credential.
///
/// Implementations must not retry internally; the caller decides what a
/// failure means for the credential it guards.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn exchange(
        &self,
        name: &str,
        refresh_secret: Option<&str>,
    ) -> Result<ExchangeOutcome, AuthError>;

    /// Short label used in logs and `auth status`
    fn describe(&self) -> String;
}
