// src/auth/manager.rs
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::cognito::{CognitoRefreshExchange, IdentityPoolExchange};
use super::credential::{Credential, CredentialOrigin, Secret};
use super::error::AuthError;
use super::refreshable::RefreshableCredential;
use crate::core::ConfigManager;

pub const COGNITO_ID_TOKEN: &str = "cognito_id_token";
pub const AWS_SESSION: &str = "aws_session";
pub const SELF_INTRO_TOKEN: &str = "self_intro_token";
pub const JOB_DETAILS_COOKIE: &str = "job_details_cookie";
pub const OWA_COOKIE: &str = "owa_cookie";

const FALLBACK_TOKEN_TTL_MINS: i64 = 60;

struct ManualEntry {
    credential: Option<Credential>,
    env_var: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub name: String,
    pub kind: &'static str,
    pub source: String,
    pub origin: Option<CredentialOrigin>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    pub exchanges: u64,
}

/// Registry of the named credentials used by the API clients.
#[derive(Default)]
pub struct CredentialManager {
    refreshable: BTreeMap<String, Arc<RefreshableCredential>>,
    manual: BTreeMap<String, ManualEntry>,
}

impl CredentialManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire the credentials described by the configuration.
    pub fn from_config(config: &ConfigManager, client: reqwest::Client) -> Self {
        let creds = &config.credentials;
        let endpoints = &config.environment.endpoints;
        let limits = &config.environment.limits;
        let skew = Duration::seconds(limits.refresh_skew_secs);
        let fallback_ttl = Duration::minutes(FALLBACK_TOKEN_TTL_MINS);

        let mut manager = Self::new();

        let mut id_token = RefreshableCredential::new(
            COGNITO_ID_TOKEN,
            Arc::new(CognitoRefreshExchange::new(
                client.clone(),
                &endpoints.cognito_idp_url,
                &creds.cognito_client_id,
                "COGNITO_REFRESH_TOKEN",
            )
            .with_token_kind(creds.cognito_token_kind)),
            creds.cognito_refresh_token.clone(),
        )
        .with_skew(skew);
        if let Some(token) = &creds.cognito_id_token {
            id_token = id_token.with_initial(Credential::from_jwt(
                COGNITO_ID_TOKEN,
                token.clone(),
                CredentialOrigin::Manual,
                fallback_ttl,
            ));
        }
        let id_token = manager.register_refreshable(id_token);

        manager.register_refreshable(
            RefreshableCredential::new(
                AWS_SESSION,
                Arc::new(IdentityPoolExchange::new(
                    client.clone(),
                    &endpoints.cognito_identity_url,
                    &creds.identity_pool_id,
                    &creds.user_pool_provider,
                    id_token,
                )),
                None,
            )
            .with_skew(skew),
        );

        let mut self_intro = RefreshableCredential::new(
            SELF_INTRO_TOKEN,
            Arc::new(CognitoRefreshExchange::new(
                client,
                &endpoints.cognito_idp_url,
                &creds.self_intro_client_id,
                "SELF_INTRO_COGNITO_REFRESH_TOKEN",
            )
            .with_token_kind(creds.self_intro_token_kind)),
            creds.self_intro_refresh_token.clone(),
        )
        .with_skew(skew);
        if let Some(token) = &creds.self_intro_auth_token {
            self_intro = self_intro.with_initial(Credential::from_jwt(
                SELF_INTRO_TOKEN,
                token.clone(),
                CredentialOrigin::Manual,
                fallback_ttl,
            ));
        }
        manager.register_refreshable(self_intro);

        let cookie_ttl = Duration::minutes(limits.manual_cookie_ttl_mins);
        manager.register_manual_slot(
            JOB_DETAILS_COOKIE,
            "JOB_DETAILS_COOKIE",
            creds
                .job_details_cookie
                .as_ref()
                .map(|c| Credential::manual(JOB_DETAILS_COOKIE, Secret::Cookie(c.clone()), cookie_ttl)),
        );
        manager.register_manual_slot(
            OWA_COOKIE,
            "COOKIE_STRING",
            creds
                .owa_cookie
                .as_ref()
                .map(|c| Credential::manual(OWA_COOKIE, Secret::Cookie(c.clone()), cookie_ttl)),
        );

        manager
    }

    pub fn register_refreshable(
        &mut self,
        credential: RefreshableCredential,
    ) -> Arc<RefreshableCredential> {
        let credential = Arc::new(credential);
        self.refreshable
            .insert(credential.name().to_string(), credential.clone());
        credential
    }

    /// Register a credential the user pastes in; `env_var` is where it comes from.
    pub fn register_manual(&mut self, credential: Credential, env_var: impl Into<String>) {
        let name = credential.name.clone();
        self.register_manual_slot(&name, env_var, Some(credential));
    }

    fn register_manual_slot(
        &mut self,
        name: &str,
        env_var: impl Into<String>,
        credential: Option<Credential>,
    ) {
        self.manual.insert(
            name.to_string(),
            ManualEntry {
                credential,
                env_var: env_var.into(),
            },
        );
    }

    pub fn refreshable(&self, name: &str) -> Result<Arc<RefreshableCredential>, AuthError> {
        self.refreshable
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::UnknownCredential(name.to_string()))
    }

    /// A usable credential by name.
    pub async fn get(&self, name: &str) -> Result<Credential, AuthError> {
        if let Some(credential) = self.refreshable.get(name) {
            return credential.get().await;
        }

        let entry = self
            .manual
            .get(name)
            .ok_or_else(|| AuthError::UnknownCredential(name.to_string()))?;

        match &entry.credential {
            None => Err(AuthError::NotConfigured {
                name: name.to_string(),
                env_var: entry.env_var.clone(),
            }),
            Some(credential) if credential.is_expired() => Err(AuthError::ManualExpired {
                name: name.to_string(),
                env_var: entry.env_var.clone(),
                expired_at: credential.expires_at,
            }),
            Some(credential) => Ok(credential.clone()),
        }
    }

    /// Report that a remote API refused `stale` and obtain a replacement.
    pub async fn rejected(&self, stale: &Credential) -> Result<Credential, AuthError> {
        if let Some(credential) = self.refreshable.get(&stale.name) {
            return credential.force_refresh(stale).await;
        }

        match self.manual.get(&stale.name) {
            Some(entry) => Err(AuthError::ManualOnly {
                name: stale.name.clone(),
                env_var: entry.env_var.clone(),
            }),
            None => Err(AuthError::UnknownCredential(stale.name.clone())),
        }
    }

    /// Exchange now, regardless of the current credential's expiry.
    pub async fn refresh(&self, name: &str) -> Result<Credential, AuthError> {
        let credential = match self.refreshable.get(name) {
            Some(credential) => credential,
            None => {
                return match self.manual.get(name) {
                    Some(entry) => Err(AuthError::ManualOnly {
                        name: name.to_string(),
                        env_var: entry.env_var.clone(),
                    }),
                    None => Err(AuthError::UnknownCredential(name.to_string())),
                }
            }
        };

        app_log!(info, "Manual refresh requested for {}", name);
        match credential.snapshot().await {
            Some(current) => credential.force_refresh(&current).await,
            None => credential.get().await,
        }
    }

    pub async fn status(&self) -> Vec<CredentialStatus> {
        let now = Utc::now();
        let mut rows = Vec::new();

        for (name, credential) in &self.refreshable {
            let snapshot = credential.snapshot().await;
            rows.push(CredentialStatus {
                name: name.clone(),
                kind: "refreshable",
                source: credential.describe(),
                origin: snapshot.as_ref().map(|c| c.origin),
                expires_at: snapshot.as_ref().map(|c| c.expires_at),
                expired: snapshot.as_ref().map_or(true, |c| c.is_expired_at(now)),
                exchanges: credential.exchange_count(),
            });
        }

        for (name, entry) in &self.manual {
            rows.push(CredentialStatus {
                name: name.clone(),
                kind: "manual",
                source: entry.env_var.clone(),
                origin: entry.credential.as_ref().map(|c| c.origin),
                expires_at: entry.credential.as_ref().map(|c| c.expires_at),
                expired: entry
                    .credential
                    .as_ref()
                    .map_or(true, |c| c.is_expired_at(now)),
                exchanges: 0,
            });
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt;
    use crate::auth::testing::FakeExchange;
    use crate::environment::EnvironmentConfig;
    use std::collections::HashMap;

    fn manager_with_fake() -> (CredentialManager, Arc<FakeExchange>) {
        let exchange = Arc::new(FakeExchange::new());
        let mut manager = CredentialManager::new();
        manager.register_refreshable(RefreshableCredential::new(
            SELF_INTRO_TOKEN,
            exchange.clone(),
            Some("r0".into()),
        ));
        (manager, exchange)
    }

    #[tokio::test]
    async fn test_get_refreshable_by_name() {
        let (manager, exchange) = manager_with_fake();
        let cred = manager.get(SELF_INTRO_TOKEN).await.unwrap();
        assert_eq!(cred.token().unwrap(), "token-1");
        manager.get(SELF_INTRO_TOKEN).await.unwrap();
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_credential() {
        let (manager, _) = manager_with_fake();
        assert_eq!(
            manager.get("nope").await.unwrap_err(),
            AuthError::UnknownCredential("nope".into())
        );
    }

    #[tokio::test]
    async fn test_manual_credential_expiry_names_env_var() {
        let mut manager = CredentialManager::new();
        let mut cookie = Credential::manual(
            JOB_DETAILS_COOKIE,
            Secret::Cookie("a=b".into()),
            Duration::minutes(55),
        );
        cookie.expires_at = Utc::now() - Duration::minutes(1);
        manager.register_manual(cookie, "JOB_DETAILS_COOKIE");

        match manager.get(JOB_DETAILS_COOKIE).await.unwrap_err() {
            AuthError::ManualExpired { env_var, .. } => assert_eq!(env_var, "JOB_DETAILS_COOKIE"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_manual_credential_cannot_be_refreshed() {
        let mut manager = CredentialManager::new();
        let cookie = Credential::manual(OWA_COOKIE, Secret::Cookie("a=b".into()), Duration::hours(1));
        manager.register_manual(cookie.clone(), "COOKIE_STRING");

        assert!(matches!(
            manager.rejected(&cookie).await,
            Err(AuthError::ManualOnly { .. })
        ));
        assert!(matches!(
            manager.refresh(OWA_COOKIE).await,
            Err(AuthError::ManualOnly { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_forces_exchange() {
        let (manager, exchange) = manager_with_fake();
        manager.get(SELF_INTRO_TOKEN).await.unwrap();
        let refreshed = manager.refresh(SELF_INTRO_TOKEN).await.unwrap();
        assert_eq!(refreshed.token().unwrap(), "token-2");
        assert_eq!(exchange.calls(), 2);
    }

    #[tokio::test]
    async fn test_from_config_registers_all_credentials() {
        let token = jwt::test_token(
            DateTime::from_timestamp(Utc::now().timestamp() + 3600, 0).unwrap(),
        );
        let vars: HashMap<&str, String> = HashMap::from([
            ("SELF_INTRO_AUTH_TOKEN", token.clone()),
            ("JOB_DETAILS_COOKIE", "session=1".to_string()),
        ]);
        let config = ConfigManager::from_lookup(EnvironmentConfig::default(), |k| {
            vars.get(k).cloned()
        })
        .unwrap();

        let manager = CredentialManager::from_config(&config, reqwest::Client::new());
        let status = manager.status().await;
        let names: Vec<_> = status.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![AWS_SESSION, COGNITO_ID_TOKEN, SELF_INTRO_TOKEN, JOB_DETAILS_COOKIE, OWA_COOKIE]
        );

        let self_intro = manager.get(SELF_INTRO_TOKEN).await.unwrap();
        assert_eq!(self_intro.token().unwrap(), token);
        assert_eq!(self_intro.origin, CredentialOrigin::Manual);

        assert!(manager.get(JOB_DETAILS_COOKIE).await.is_ok());
        assert!(matches!(
            manager.get(OWA_COOKIE).await,
            Err(AuthError::NotConfigured { .. })
        ));
        assert!(matches!(
            manager.get(COGNITO_ID_TOKEN).await,
            Err(AuthError::MissingRefreshSecret { .. })
        ));
    }
}
