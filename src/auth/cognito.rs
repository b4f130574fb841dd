// src/auth/cognito.rs
//! Exchanges against the Cognito user pool and identity pool JSON APIs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::credential::{AwsKeys, Credential, CredentialOrigin, Secret};
use super::error::AuthError;
use super::exchange::{Exchange, ExchangeOutcome};
use super::refreshable::RefreshableCredential;

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const INITIATE_AUTH_TARGET: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const GET_ID_TARGET: &str = "AWSCognitoIdentityService.GetId";
const GET_CREDENTIALS_TARGET: &str = "AWSCognitoIdentityService.GetCredentialsForIdentity";
const AMPLIFY_USER_AGENT: &str = "aws-amplify/5.0.4 js";
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;
const MAX_ERROR_BODY: usize = 300;

/// Which token of the `AuthenticationResult` the credential carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenKind {
    #[default]
    IdToken,
    AccessToken,
}

impl std::str::FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "id" | "id_token" | "idtoken" => Ok(TokenKind::IdToken),
            "access" | "access_token" | "accesstoken" => Ok(TokenKind::AccessToken),
            other => Err(format!("unknown token kind '{}', expected 'id' or 'access'", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetCredentialsResponse {
    credentials: Option<IdentityCredentials>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IdentityCredentials {
    access_key_id: Option<String>,
    secret_key: Option<String>,
    session_token: Option<String>,
    expiration: Option<Value>,
}

/// POST an `x-amz-json-1.1` request and return the parsed body.
async fn post_amz_json<R: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    name: &str,
    endpoint: &str,
    target: &str,
    payload: &Value,
) -> Result<R, AuthError> {
    let response = client
        .post(endpoint)
        .header(CONTENT_TYPE, AMZ_JSON)
        .header("X-Amz-Target", target)
        .header("X-Amz-User-Agent", AMPLIFY_USER_AGENT)
        .body(payload.to_string())
        .send()
        .await
        .map_err(|e| AuthError::exchange_failed(name, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::exchange_failed(name, e))?;

    if !status.is_success() {
        return Err(AuthError::ExchangeRejected {
            name: name.to_string(),
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| AuthError::malformed(name, format!("{} response: {}", target, e)))
}

/// `REFRESH_TOKEN_AUTH` against a user pool app client.
pub struct CognitoRefreshExchange {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    refresh_env_var: String,
    token_kind: TokenKind,
}

impl CognitoRefreshExchange {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        refresh_env_var: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            refresh_env_var: refresh_env_var.into(),
            token_kind: TokenKind::default(),
        }
    }

    pub fn with_token_kind(mut self, token_kind: TokenKind) -> Self {
        self.token_kind = token_kind;
        self
    }
}

#[async_trait]
impl Exchange for CognitoRefreshExchange {
    async fn exchange(
        &self,
        name: &str,
        refresh_secret: Option<&str>,
    ) -> Result<ExchangeOutcome, AuthError> {
        let refresh_token = refresh_secret
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AuthError::MissingRefreshSecret {
                name: name.to_string(),
                env_var: self.refresh_env_var.clone(),
            })?;

        let payload = json!({
            "ClientId": self.client_id,
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "AuthParameters": {
                "REFRESH_TOKEN": refresh_token,
                "DEVICE_KEY": null,
            }
        });

        let response: InitiateAuthResponse =
            post_amz_json(&self.client, name, &self.endpoint, INITIATE_AUTH_TARGET, &payload)
                .await?;

        let result = response
            .authentication_result
            .ok_or_else(|| AuthError::malformed(name, "missing AuthenticationResult"))?;

        let token = match self.token_kind {
            TokenKind::IdToken => result.id_token,
            TokenKind::AccessToken => result.access_token,
        }
        .ok_or_else(|| AuthError::malformed(name, format!("missing {:?}", self.token_kind)))?;

        let fallback_ttl = Duration::seconds(result.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS));
        let credential =
            Credential::from_jwt(name, token, CredentialOrigin::Refreshed, fallback_ttl);

        Ok(ExchangeOutcome::new(credential).with_rotation(result.refresh_token))
    }

    fn describe(&self) -> String {
        format!("cognito refresh ({})", self.refresh_env_var)
    }
}

/// Temporary AWS keys for an identity pool, authenticated with an ID token
/// from another refreshable credential.
pub struct IdentityPoolExchange {
    client: reqwest::Client,
    endpoint: String,
    identity_pool_id: String,
    login_provider: String,
    id_token: Arc<RefreshableCredential>,
}

impl IdentityPoolExchange {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        identity_pool_id: impl Into<String>,
        login_provider: impl Into<String>,
        id_token: Arc<RefreshableCredential>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            identity_pool_id: identity_pool_id.into(),
            login_provider: login_provider.into(),
            id_token,
        }
    }

    fn logins(&self, jwt: &str) -> HashMap<String, String> {
        HashMap::from([(self.login_provider.clone(), jwt.to_string())])
    }

    async fn mint(&self, name: &str, jwt: &str) -> Result<Credential, AuthError> {
        let get_id: GetIdResponse = post_amz_json(
            &self.client,
            name,
            &self.endpoint,
            GET_ID_TARGET,
            &json!({
                "IdentityPoolId": self.identity_pool_id,
                "Logins": self.logins(jwt),
            }),
        )
        .await?;

        let identity_id = get_id
            .identity_id
            .ok_or_else(|| AuthError::malformed(name, "missing IdentityId"))?;
        app_log!(debug, "{}: identity {}", name, identity_id);

        let response: GetCredentialsResponse = post_amz_json(
            &self.client,
            name,
            &self.endpoint,
            GET_CREDENTIALS_TARGET,
            &json!({
                "IdentityId": identity_id,
                "Logins": self.logins(jwt),
            }),
        )
        .await?;

        let creds = response
            .credentials
            .ok_or_else(|| AuthError::malformed(name, "missing Credentials"))?;

        let (Some(access_key_id), Some(secret_key)) = (creds.access_key_id, creds.secret_key)
        else {
            return Err(AuthError::malformed(name, "missing AccessKeyId or SecretKey"));
        };

        let expires_at = creds
            .expiration
            .as_ref()
            .and_then(parse_expiration)
            .ok_or_else(|| AuthError::malformed(name, "missing or unreadable Expiration"))?;

        Ok(Credential::new(
            name,
            Secret::Aws(AwsKeys {
                access_key_id,
                secret_key,
                session_token: creds.session_token,
            }),
            expires_at,
            CredentialOrigin::Refreshed,
        ))
    }
}

#[async_trait]
impl Exchange for IdentityPoolExchange {
    async fn exchange(
        &self,
        name: &str,
        _refresh_secret: Option<&str>,
    ) -> Result<ExchangeOutcome, AuthError> {
        let id_credential = self.id_token.get().await?;
        let jwt = id_credential.token()?.to_string();

        match self.mint(name, &jwt).await {
            // The pool refuses an ID token the user pool already revoked;
            // renew it once and try again.
            Err(AuthError::ExchangeRejected { status, body, .. })
                if (400..500).contains(&status) && body.contains("NotAuthorized") =>
            {
                app_log!(warn, "{}: ID token refused by identity pool, renewing", name);
                let renewed = self.id_token.force_refresh(&id_credential).await?;
                let credential = self.mint(name, renewed.token()?).await?;
                Ok(ExchangeOutcome::new(credential))
            }
            other => other.map(ExchangeOutcome::new),
        }
    }

    fn describe(&self) -> String {
        format!("identity pool via {}", self.id_token.name())
    }
}

/// `Expiration` is epoch seconds in the JSON protocol; accept RFC 3339 too.
fn parse_expiration(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(|secs| DateTime::from_timestamp(secs.trunc() as i64, 0)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| s.parse::<f64>().ok().and_then(|secs| DateTime::from_timestamp(secs as i64, 0))),
        _ => None,
    }
}
