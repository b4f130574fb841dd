// src/auth/mod.rs
//! Credential lifecycle: manual browser secrets, self-refreshing tokens and
//! the AWS keys minted from them.

pub mod cognito;
pub mod cookies;
pub mod credential;
pub mod error;
pub mod exchange;
pub mod jwt;
pub mod manager;
pub mod refreshable;
pub mod sigv4;

#[cfg(test)]
pub(crate) mod testing;

pub use cognito::{CognitoRefreshExchange, IdentityPoolExchange, TokenKind};
pub use credential::{AwsKeys, Credential, CredentialOrigin, Secret};
pub use error::AuthError;
pub use exchange::{Exchange, ExchangeOutcome};
pub use manager::{CredentialManager, CredentialStatus};
pub use refreshable::RefreshableCredential;
pub use sigv4::SigV4Signer;
