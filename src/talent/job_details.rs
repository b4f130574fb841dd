// src/talent/job_details.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::auth::manager::JOB_DETAILS_COOKIE;
use crate::auth::{AuthError, CredentialManager};
use crate::core::service_client::preview;
use crate::core::{ConfigManager, ServiceClient};

const SERVICE: &str = "job-details";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Raw job details document; accessors read the handful of fields we use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobDetails(pub Value);

impl JobDetails {
    fn job(&self) -> &Value {
        &self.0["job"]
    }

    pub fn title(&self) -> Option<&str> {
        self.job()["role"]["title"].as_str()
    }

    pub fn department(&self) -> Option<&str> {
        self.job()["department"]["name"].as_str()
    }

    pub fn description(&self) -> &str {
        self.job()["descriptionInternal"].as_str().unwrap_or_default()
    }

    fn qualifications(&self, kind: &str) -> Vec<&str> {
        self.job()["jobQualifications"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|q| q["qualificationType"].as_str() == Some(kind))
                    .filter_map(|q| q["qualificationData"].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn required_qualifications(&self) -> Vec<&str> {
        self.qualifications("REQUIRED")
    }

    pub fn preferred_qualifications(&self) -> Vec<&str> {
        self.qualifications("PREFERRED")
    }
}

/// Anything that can produce the details of a job by id.
#[async_trait]
pub trait JobDetailsSource: Send + Sync {
    async fn details(&self, job_id: &str) -> Result<JobDetails>;
}

pub struct JobDetailsClient {
    service: ServiceClient,
    credentials: Arc<CredentialManager>,
    base_url: String,
    referer_base: String,
}

impl JobDetailsClient {
    pub fn new(
        service: ServiceClient,
        credentials: Arc<CredentialManager>,
        config: &ConfigManager,
    ) -> Self {
        let endpoints = &config.environment.endpoints;
        Self {
            service,
            credentials,
            base_url: endpoints.job_details_url.trim_end_matches('/').to_string(),
            referer_base: endpoints.job_details_referer.trim_end_matches('/').to_string(),
        }
    }

    fn cookie_expired() -> AuthError {
        AuthError::ManualExpired {
            name: JOB_DETAILS_COOKIE.to_string(),
            env_var: "JOB_DETAILS_COOKIE".to_string(),
            expired_at: Utc::now(),
        }
    }
}

#[async_trait]
impl JobDetailsSource for JobDetailsClient {
    async fn details(&self, job_id: &str) -> Result<JobDetails> {
        let credential = self.credentials.get(JOB_DETAILS_COOKIE).await?;
        let url = format!("{}/{}", self.base_url, job_id);

        info!("Fetching job details for job ID: {}", job_id);
        let request = self
            .service
            .http()
            .get(&url)
            .header("accept", "application/json, text/plain, */*")
            .header("content-type", "application/json")
            .header("cookie", credential.cookie()?)
            .header("referer", format!("{}/{}", self.referer_base, job_id))
            .header("user-agent", BROWSER_USER_AGENT);

        let reply = self.service.send(SERVICE, request).await?;
        match reply.status {
            200 if reply.is_html() => {
                app_log!(error, "Got a login page instead of job details; the cookie has expired");
                Err(Self::cookie_expired().into())
            }
            200 => Ok(JobDetails(reply.json()?)),
            401 => Err(Self::cookie_expired().into()),
            403 => anyhow::bail!("Access to job {} is forbidden (403)", job_id),
            404 => anyhow::bail!("Job {} not found (404)", job_id),
            status => anyhow::bail!(
                "Job details for {} failed with status {}: {}",
                job_id,
                status,
                preview(&reply.body, 200)
            ),
        }
    }
}
