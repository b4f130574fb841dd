// src/talent/employees.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::signed_get;
use crate::auth::{CredentialManager, SigV4Signer};
use crate::core::service_client::preview;
use crate::core::{ConfigManager, ServiceClient};

const SERVICE: &str = "employee-details";
const SDK_USER_AGENT: &str = "aws-sdk-js/2.1544.0 promise";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeIds {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDetails {
    #[serde(default)]
    pub employee_ids: EmployeeIds,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Sent as a string or a number depending on the record
    #[serde(default)]
    pub job_level: Value,
    #[serde(default)]
    pub manager_employee_ids: Option<EmployeeIds>,
}

impl EmployeeDetails {
    pub fn level(&self) -> u32 {
        match &self.job_level {
            Value::Number(n) => n.as_u64().unwrap_or(0) as u32,
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn level_label(&self) -> Option<String> {
        match &self.job_level {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn manager_login(&self) -> Option<&str> {
        self.manager_employee_ids
            .as_ref()
            .and_then(|ids| ids.login.as_deref())
            .filter(|login| !login.is_empty())
    }
}

/// One step of a management chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    pub alias: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_level: Option<String>,
}

pub struct EmployeeClient {
    service: ServiceClient,
    credentials: Arc<CredentialManager>,
    signer: SigV4Signer,
    base_url: String,
    origin: String,
    max_hops: usize,
}

impl EmployeeClient {
    pub fn new(
        service: ServiceClient,
        credentials: Arc<CredentialManager>,
        config: &ConfigManager,
    ) -> Self {
        let endpoints = &config.environment.endpoints;
        Self {
            service,
            credentials,
            signer: SigV4Signer::execute_api(&endpoints.aws_region),
            base_url: endpoints.employee_details_url.trim_end_matches('/').to_string(),
            origin: endpoints.talent_origin.clone(),
            max_hops: config.environment.limits.hierarchy_max_hops,
        }
    }

    pub async fn details(&self, login: &str) -> Result<EmployeeDetails> {
        let url = format!("{}/{}", self.base_url, login);
        let headers = vec![
            ("accept".to_string(), "*/*".to_string()),
            ("origin".to_string(), self.origin.clone()),
            ("referer".to_string(), format!("{}/", self.origin)),
            ("x-amz-user-agent".to_string(), SDK_USER_AGENT.to_string()),
        ];

        info!("Fetching employee details for: {}", login);
        let reply = signed_get(SERVICE, &self.service, &self.credentials, &self.signer, &url, &headers)
            .await?;
        if reply.status != 200 {
            anyhow::bail!(
                "Employee details for {} failed with status {}: {}",
                login,
                reply.status,
                preview(&reply.body, 300)
            );
        }
        reply
            .json()
            .with_context(|| format!("Unexpected employee details for {}", login))
    }

    /// Walk the management chain from `login` until someone at or above
    /// `target_level` is reached or nobody is left above.
    ///
    /// A lookup failure on the first employee is an error; later failures
    /// end the walk with what was collected.
    pub async fn hierarchy(&self, login: &str, target_level: u32) -> Result<Vec<HierarchyEntry>> {
        let mut chain = Vec::new();
        let mut current = Some(login.to_string());

        while let Some(username) = current.take() {
            if chain.len() >= self.max_hops {
                warn!("Stopped hierarchy walk for {} after {} hops", login, self.max_hops);
                break;
            }

            let details = match self.details(&username).await {
                Ok(details) => details,
                Err(e) if chain.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Hierarchy walk stopped at {}: {:#}", username, e);
                    break;
                }
            };

            let level = details.level();
            chain.push(HierarchyEntry {
                alias: details.employee_ids.login.clone(),
                first_name: details.first_name.clone(),
                last_name: details.last_name.clone(),
                job_level: details.level_label(),
            });

            if level >= target_level {
                info!("Reached target level L{} (found L{})", target_level, level);
                break;
            }
            current = details.manager_login().map(str::to_string);
            if current.is_none() {
                info!("No more managers found (stopped at L{})", level);
            }
        }

        Ok(chain)
    }
}
