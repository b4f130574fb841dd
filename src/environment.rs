// src/environment.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::FsOps;

/// Paths, endpoints and limits for one deployment environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Folder holding `per_job/`, state files and aggregated results
    pub results_path: PathBuf,
    /// Candidate profile used by the matcher
    pub profile_path: PathBuf,
    pub endpoints: EndpointsConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub aws_region: String,
    pub cognito_idp_url: String,
    pub cognito_identity_url: String,
    pub jobs_search_url: String,
    pub job_details_url: String,
    pub job_details_referer: String,
    pub employee_details_url: String,
    pub talent_origin: String,
    pub self_intro_url: String,
    pub self_intro_origin: String,
    pub owa_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub request_timeout_secs: u64,
    pub jobs_page_size: usize,
    pub generate_concurrency: usize,
    pub submit_concurrency: usize,
    pub refresh_skew_secs: i64,
    /// Assumed lifetime of a pasted browser cookie
    pub manual_cookie_ttl_mins: i64,
    pub hierarchy_target_level: u32,
    pub hierarchy_max_hops: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            results_path: PathBuf::from("output"),
            profile_path: PathBuf::from("candidate_profile.toml"),
            endpoints: EndpointsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            aws_region: "us-west-2".to_string(),
            cognito_idp_url: "https://cognito-idp.us-west-2.amazonaws.com/".to_string(),
            cognito_identity_url: "https://cognito-identity.us-west-2.amazonaws.com/".to_string(),
            jobs_search_url: "https://api.prod.internal-transfer.talent.amazon.dev/v1/jobs/search?country=USA&jobCategory=Software%20Development&jobLevel=5&query=&sort=recent".to_string(),
            job_details_url: "https://atoz.amazon.work/apis/InternalTransferPortal/v1/job/details/icims".to_string(),
            job_details_referer: "https://atoz.amazon.work/jobs/role".to_string(),
            employee_details_url: "https://api.prod.dependency-provider.talent.amazon.dev/v1/employee/details/login".to_string(),
            talent_origin: "https://internal-transfer.talent.amazon.dev".to_string(),
            self_intro_url: "https://data.prod.movement.talent.amazon.dev/v1/selfIntroduction".to_string(),
            self_intro_origin: "https://prod.aboutme.talent.amazon.dev".to_string(),
            owa_base_url: "https://magnolia.amazon.com".to_string(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            jobs_page_size: 20,
            generate_concurrency: 5,
            submit_concurrency: 10,
            refresh_skew_secs: 300,
            manual_cookie_ttl_mins: 55,
            hierarchy_target_level: 8,
            hierarchy_max_hops: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    local: Option<EnvironmentConfig>,
    production: Option<EnvironmentConfig>,
}

impl EnvironmentConfig {
    /// Load configuration based on environment
    pub fn load() -> Result<Self> {
        let environment = Self::get_environment();
        info!("Loading configuration for environment: {}", environment);

        let config_path = PathBuf::from("config.yaml");
        let config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config.yaml")?;
            Self::from_yaml(&content, &environment)?
        } else {
            info!("config.yaml not found, using built-in defaults");
            Self::default()
        };

        config.resolved()
    }

    fn get_environment() -> String {
        std::env::var("TRANSFER_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "local".to_string())
    }

    /// Pick the section for `environment`; a missing section means defaults.
    pub fn from_yaml(content: &str, environment: &str) -> Result<Self> {
        let config_file: ConfigFile =
            serde_yaml::from_str(content).context("Failed to parse config.yaml")?;

        let section = match environment {
            "production" => config_file.production,
            _ => config_file.local,
        };

        Ok(section.unwrap_or_default())
    }

    fn resolved(self) -> Result<Self> {
        Ok(Self {
            results_path: Self::resolve_path(&self.results_path)?,
            profile_path: Self::resolve_path(&self.profile_path)?,
            ..self
        })
    }

    fn resolve_path(path: &Path) -> Result<PathBuf> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(FsOps::normalize_path(&current_dir, path))
    }

    /// Per-job match decisions written by the matcher
    pub fn per_job_dir(&self) -> PathBuf {
        self.results_path.join("per_job")
    }

    /// Per-job informational request state
    pub fn request_state_dir(&self) -> PathBuf {
        self.results_path.join("per_job_request_informational")
    }

    pub fn match_results_path(&self) -> PathBuf {
        self.results_path.join("job_match_results.json")
    }

    pub fn sent_emails_state_path(&self) -> PathBuf {
        self.results_path.join("sent_emails_state.json")
    }

    pub fn request_results_path(&self) -> PathBuf {
        self.results_path.join("request_informational_results.json")
    }

    /// Ensure all configured directories exist
    pub async fn ensure_directories(&self) -> Result<()> {
        for dir in [self.per_job_dir(), self.request_state_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        info!("All configured directories ensured to exist");
        Ok(())
    }
}
