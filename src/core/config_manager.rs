// src/core/config_manager.rs
//! Unified configuration: environment file plus secrets from the process environment

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use super::FsOps;
use crate::auth::TokenKind;
use crate::environment::EnvironmentConfig;

const DEFAULT_COGNITO_CLIENT_ID: &str = "6hr71icfdda6n67uvvm3nvlu4d";
const DEFAULT_SELF_INTRO_CLIENT_ID: &str = "1h1ms88guc4kn86rmdc6er1ecl";
const DEFAULT_IDENTITY_POOL_ID: &str = "us-west-2:74ab0fc1-ddcb-43b1-a90d-32fec0b92043";
const DEFAULT_USER_POOL_PROVIDER: &str = "cognito-idp.us-west-2.amazonaws.com/us-west-2_fTk7zNMno";
const DEFAULT_HIERARCHY_DOMAIN: &str = "amazon.com";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub credentials: CredentialSettings,
    pub mail: MailSettings,
    pub completion: CompletionSettings,
    pub requester_people_soft_id: Option<String>,
    pub candidate_summary: Option<String>,
}

#[derive(Clone, Default)]
pub struct CredentialSettings {
    pub cognito_refresh_token: Option<String>,
    pub cognito_id_token: Option<String>,
    pub cognito_client_id: String,
    pub cognito_token_kind: TokenKind,
    pub identity_pool_id: String,
    pub user_pool_provider: String,
    pub self_intro_auth_token: Option<String>,
    pub self_intro_refresh_token: Option<String>,
    pub self_intro_client_id: String,
    pub self_intro_token_kind: TokenKind,
    pub job_details_cookie: Option<String>,
    pub owa_cookie: Option<String>,
}

impl std::fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("CredentialSettings")
            .field("cognito_refresh_token", &set(&self.cognito_refresh_token))
            .field("cognito_id_token", &set(&self.cognito_id_token))
            .field("cognito_client_id", &self.cognito_client_id)
            .field("cognito_token_kind", &self.cognito_token_kind)
            .field("identity_pool_id", &self.identity_pool_id)
            .field("user_pool_provider", &self.user_pool_provider)
            .field("self_intro_auth_token", &set(&self.self_intro_auth_token))
            .field("self_intro_refresh_token", &set(&self.self_intro_refresh_token))
            .field("self_intro_client_id", &self.self_intro_client_id)
            .field("self_intro_token_kind", &self.self_intro_token_kind)
            .field("job_details_cookie", &set(&self.job_details_cookie))
            .field("owa_cookie", &set(&self.owa_cookie))
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MailSettings {
    pub subject: Option<String>,
    pub body_template: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub create_action_id: Option<String>,
    pub create_action_name: Option<String>,
    pub update_action_id: Option<String>,
    pub update_action_name: Option<String>,
    /// Also address the hiring manager chain found by the matcher
    pub notify_hierarchy: bool,
    /// Domain appended to hierarchy aliases
    pub hierarchy_domain: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl ConfigManager {
    /// Load all configurations
    pub fn load() -> Result<Self> {
        let environment = EnvironmentConfig::load()?;
        let config = Self::from_lookup(environment, |key| std::env::var(key).ok())?;
        info!(
            "Configuration loaded, results folder: {}",
            config.environment.results_path.display()
        );
        Ok(config)
    }

    /// Build from an environment config and a variable lookup; blank values
    /// count as unset.
    pub fn from_lookup<F>(mut environment: EnvironmentConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(folder) = var("JOB_MATCH_RESULTS_FOLDER_NAME") {
            let folder = PathBuf::from(folder.trim());
            environment.results_path = FsOps::normalize_path(&std::env::current_dir()?, &folder);
        }

        let token_kind = |key: &str| -> Result<TokenKind> {
            match var(key) {
                Some(raw) => raw.parse::<TokenKind>().map_err(|e| anyhow::anyhow!("{}: {}", key, e)),
                None => Ok(TokenKind::default()),
            }
        };

        let credentials = CredentialSettings {
            cognito_refresh_token: var("COGNITO_REFRESH_TOKEN"),
            cognito_id_token: var("COGNITO_ID_TOKEN"),
            cognito_client_id: var("COGNITO_CLIENT_ID")
                .unwrap_or_else(|| DEFAULT_COGNITO_CLIENT_ID.to_string()),
            cognito_token_kind: token_kind("COGNITO_TOKEN_KIND")?,
            identity_pool_id: var("COGNITO_IDENTITY_POOL_ID")
                .unwrap_or_else(|| DEFAULT_IDENTITY_POOL_ID.to_string()),
            user_pool_provider: var("COGNITO_USER_POOL_PROVIDER")
                .unwrap_or_else(|| DEFAULT_USER_POOL_PROVIDER.to_string()),
            self_intro_auth_token: var("SELF_INTRO_AUTH_TOKEN"),
            self_intro_refresh_token: var("SELF_INTRO_COGNITO_REFRESH_TOKEN"),
            self_intro_client_id: var("SELF_INTRO_CLIENT_ID")
                .unwrap_or_else(|| DEFAULT_SELF_INTRO_CLIENT_ID.to_string()),
            self_intro_token_kind: token_kind("SELF_INTRO_TOKEN_KIND")?,
            job_details_cookie: var("JOB_DETAILS_COOKIE"),
            owa_cookie: var("COOKIE_STRING"),
        };

        let mail = MailSettings {
            subject: var("SUBJECT"),
            body_template: var("BODY"),
            to: split_addresses(var("TO_ADDRS").as_deref()),
            cc: split_addresses(var("CC_ADDRS").as_deref()),
            bcc: split_addresses(var("BCC_ADDRS").as_deref()),
            create_action_id: var("CREATE_ACTION_ID"),
            create_action_name: var("CREATE_ACTION_NAME"),
            update_action_id: var("UPDATE_ACTION_ID"),
            update_action_name: var("UPDATE_ACTION_NAME"),
            notify_hierarchy: var("NOTIFY_HIERARCHY")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            hierarchy_domain: var("HIERARCHY_EMAIL_DOMAIN")
                .map(|d| d.trim().trim_start_matches('@').to_string())
                .unwrap_or_else(|| DEFAULT_HIERARCHY_DOMAIN.to_string()),
        };

        let completion = CompletionSettings {
            api_url: var("COMPLETION_API_URL"),
            api_key: var("COMPLETION_API_KEY"),
            model: var("COMPLETION_MODEL"),
        };

        Ok(Self {
            environment,
            credentials,
            mail,
            completion,
            requester_people_soft_id: var("REQUESTER_PEOPLE_SOFT_ID"),
            candidate_summary: var("CANDIDATE_SUMMARY"),
        })
    }

    /// Ensure all required directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        self.environment.ensure_directories().await
    }
}

/// Value of a required setting, or an error naming its variable.
pub fn require<'a>(value: &'a Option<String>, var: &str) -> Result<&'a str> {
    match value {
        Some(v) => Ok(v.as_str()),
        None => anyhow::bail!("{} is not set", var),
    }
}

/// Comma-separated addresses, trimmed, empties dropped.
pub fn split_addresses(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> ConfigManager {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigManager::from_lookup(EnvironmentConfig::default(), |k| map.get(k).cloned()).unwrap()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = load_with(&[]);
        assert_eq!(config.credentials.cognito_client_id, DEFAULT_COGNITO_CLIENT_ID);
        assert_eq!(config.credentials.self_intro_client_id, DEFAULT_SELF_INTRO_CLIENT_ID);
        assert!(config.credentials.cognito_refresh_token.is_none());
        assert!(!config.mail.notify_hierarchy);
        assert!(config.mail.to.is_empty());
    }

    #[test]
    fn test_blank_values_are_unset_and_lists_split() {
        let config = load_with(&[
            ("COGNITO_REFRESH_TOKEN", "   "),
            ("TO_ADDRS", " a@x.com, ,b@x.com ,"),
            ("NOTIFY_HIERARCHY", "True"),
            ("JOB_MATCH_RESULTS_FOLDER_NAME", "/tmp/results"),
        ]);
        assert!(config.credentials.cognito_refresh_token.is_none());
        assert_eq!(config.mail.to, vec!["a@x.com", "b@x.com"]);
        assert!(config.mail.notify_hierarchy);
        assert_eq!(config.environment.results_path, PathBuf::from("/tmp/results"));
    }

    #[test]
    fn test_token_kind_settings() {
        let config = load_with(&[("SELF_INTRO_TOKEN_KIND", "access")]);
        assert_eq!(config.credentials.self_intro_token_kind, TokenKind::AccessToken);
        assert_eq!(config.credentials.cognito_token_kind, TokenKind::IdToken);

        let map: HashMap<String, String> =
            HashMap::from([("COGNITO_TOKEN_KIND".to_string(), "refresh".to_string())]);
        let err = ConfigManager::from_lookup(EnvironmentConfig::default(), |k| map.get(k).cloned())
            .unwrap_err();
        assert!(err.to_string().contains("COGNITO_TOKEN_KIND"));
    }

    #[test]
    fn test_require_names_variable() {
        let err = require(&None, "REQUESTER_PEOPLE_SOFT_ID").unwrap_err();
        assert!(err.to_string().contains("REQUESTER_PEOPLE_SOFT_ID"));
        assert_eq!(require(&Some("1".into()), "X").unwrap(), "1");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = load_with(&[("COOKIE_STRING", "session=secret-value")]);
        let rendered = format!("{:?}", config.credentials);
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("<set>"));
    }
}
