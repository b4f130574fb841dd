// src/auth/error.rs
use chrono::{DateTime, Utc};

/// Failures of the credential layer.
///
/// Clone so that callers waiting on an in-flight exchange can all receive
/// the outcome of that single attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Unknown credential: {0}")]
    UnknownCredential(String),

    #[error("{name}: no refresh secret configured (set {env_var})")]
    MissingRefreshSecret { name: String, env_var: String },

    #[error("{name}: not configured (set {env_var})")]
    NotConfigured { name: String, env_var: String },

    #[error("{name}: manual credential cannot be refreshed; re-extract {env_var} from the browser")]
    ManualOnly { name: String, env_var: String },

    #[error("{name}: manual credential expired at {expired_at}; re-extract {env_var} from the browser")]
    ManualExpired {
        name: String,
        env_var: String,
        expired_at: DateTime<Utc>,
    },

    #[error("{name}: exchange rejected with status {status}: {body}")]
    ExchangeRejected {
        name: String,
        status: u16,
        body: String,
    },

    #[error("{name}: exchange failed: {message}")]
    ExchangeFailed { name: String, message: String },

    #[error("{name}: malformed exchange response: {message}")]
    MalformedResponse { name: String, message: String },

    #[error("{service} rejected the request credentials (status {status})")]
    Rejected { service: String, status: u16 },

    #[error("{name}: credential does not hold a {expected}")]
    WrongSecretKind { name: String, expected: &'static str },
}

impl AuthError {
    pub fn exchange_failed(name: &str, err: impl std::fmt::Display) -> Self {
        AuthError::ExchangeFailed {
            name: name.to_string(),
            message: err.to_string(),
        }
    }

    pub fn malformed(name: &str, message: impl Into<String>) -> Self {
        AuthError::MalformedResponse {
            name: name.to_string(),
            message: message.into(),
        }
    }
}
