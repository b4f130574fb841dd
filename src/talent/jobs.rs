// src/talent/jobs.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::html::{clean_text, html_to_text};
use super::signed_get;
use crate::auth::{CredentialManager, SigV4Signer};
use crate::core::service_client::preview;
use crate::core::{ConfigManager, ServiceClient};

const SERVICE: &str = "jobs-search";

/// A search hit reduced to the fields the matcher and mailer read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub job_id: String,
    pub title: String,
    pub hiring_manager_usernames: Vec<String>,
    pub hiring_manager_names: Vec<String>,
    pub recruiter_usernames: Vec<String>,
    pub recruiter_names: Vec<String>,
    pub basic_qualifications: String,
    pub preferred_qualifications: String,
    pub description: String,
    #[serde(default)]
    pub raw_fields: Value,
}

impl JobListing {
    /// Build from one search result (`{"fields": {...}}`); every field is a list.
    pub fn from_search_result(result: &Value) -> Self {
        let fields = result.get("fields").cloned().unwrap_or(Value::Null);

        let first = |key: &str| field_list(&fields, key).into_iter().next();
        let joined = |key: &str| html_to_text(&field_list(&fields, key).join("\n"));

        let hiring_managers = field_list(&fields, "hiringManager");
        let recruiters = field_list(&fields, "recruiters");

        Self {
            job_id: first("icimsJobId").unwrap_or_default(),
            title: clean_text(&first("title").or_else(|| first("titleExternal")).unwrap_or_default()),
            hiring_manager_usernames: hiring_managers.iter().map(|p| person_alias(p)).collect(),
            hiring_manager_names: hiring_managers.iter().map(|p| person_name(p)).collect(),
            recruiter_usernames: recruiters.iter().map(|p| person_alias(p)).collect(),
            recruiter_names: recruiters.iter().map(|p| person_name(p)).collect(),
            basic_qualifications: joined("basicQualifications"),
            preferred_qualifications: joined("preferredQualifications"),
            description: joined("description"),
            raw_fields: fields,
        }
    }

    pub fn first_hiring_manager(&self) -> Option<&str> {
        self.hiring_manager_usernames
            .first()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

fn field_list(fields: &Value, key: &str) -> Vec<String> {
    match fields.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// `"Jane Doe (jdoe)"` -> `jdoe`
fn person_alias(entry: &str) -> String {
    let tail = entry.rsplit('(').next().unwrap_or(entry);
    tail.trim_end_matches(')').trim().to_string()
}

/// `"Jane Doe (jdoe)"` -> `Jane Doe`
fn person_name(entry: &str) -> String {
    match entry.rfind('(') {
        Some(pos) => entry[..pos].trim().to_string(),
        None => String::new(),
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "jobSearchResults", default)]
    job_search_results: SearchResults,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResults {
    #[serde(rename = "searchResults", default)]
    search_results: Vec<Value>,
    #[serde(default)]
    found: Option<u64>,
}

pub struct JobsClient {
    service: ServiceClient,
    credentials: Arc<CredentialManager>,
    signer: SigV4Signer,
    search_url: String,
    origin: String,
    page_size: usize,
}

impl JobsClient {
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
            search_url: endpoints.jobs_search_url.clone(),
            origin: endpoints.talent_origin.clone(),
            page_size: config.environment.limits.jobs_page_size.max(1),
        }
    }

    fn page_url(&self, start: usize) -> String {
        let separator = if self.search_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}start={}&limit={}",
            self.search_url, separator, start, self.page_size
        )
    }

    /// Every listing the search returns, page by page.
    pub async fn search(&self) -> Result<Vec<JobListing>> {
        let headers = vec![
            ("Accept".to_string(), "*/*".to_string()),
            ("Origin".to_string(), self.origin.clone()),
            ("Referer".to_string(), format!("{}/", self.origin)),
        ];

        let mut raw: Vec<Value> = Vec::new();
        let mut start = 0;
        let mut found: Option<u64> = None;

        loop {
            let url = self.page_url(start);
            app_log!(debug, "GET {}", url);

            let reply = signed_get(SERVICE, &self.service, &self.credentials, &self.signer, &url, &headers)
                .await?;
            if reply.status >= 400 {
                anyhow::bail!(
                    "Job search failed with status {}: {}",
                    reply.status,
                    preview(&reply.body, 500)
                );
            }

            let page: SearchResponse = reply.json().context("Unexpected job search response")?;
            let results = page.job_search_results;
            if found.is_none() {
                found = results.found;
            }

            let page_len = results.search_results.len();
            raw.extend(results.search_results);
            info!(
                "Fetched {} jobs (start={}), total so far: {}",
                page_len,
                start,
                raw.len()
            );

            if page_len == 0 {
                break;
            }
            match found {
                Some(total) if raw.len() as u64 >= total => break,
                None if page_len < self.page_size => break,
                _ => {}
            }
            start += self.page_size;
        }

        info!("Total jobs collected: {}", raw.len());
        Ok(raw.iter().map(JobListing::from_search_result).collect())
    }
}

/// Write listings as CSV, one row per job.
pub fn export_csv(listings: &[JobListing], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;

    writer.write_record([
        "job_id",
        "title",
        "hiring_managers",
        "hiring_manager_usernames",
        "recruiters",
        "basic_qualifications",
        "preferred_qualifications",
    ])?;

    for listing in listings {
        writer.write_record([
            listing.job_id.as_str(),
            listing.title.as_str(),
            &listing.hiring_manager_names.join("; "),
            &listing.hiring_manager_usernames.join("; "),
            &listing.recruiter_names.join("; "),
            listing.basic_qualifications.as_str(),
            listing.preferred_qualifications.as_str(),
        ])?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
    info!("Exported {} jobs to {}", listings.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::manager::AWS_SESSION;
    use crate::auth::{AwsKeys, Credential, Secret};
    use crate::environment::EnvironmentConfig;
    use chrono::Duration;
    use serde_json::json;

    fn search_result(id: &str) -> Value {
        json!({
            "fields": {
                "icimsJobId": [id],
                "titleExternal": ["Software  Development Engineer II"],
                "hiringManager": ["Jane Q. Doe (jdoe)", "Sam (Sammy) Lee (slee)"],
                "recruiters": ["Pat Roe (proe)"],
                "basicQualifications": ["- 3+ years<br>- Java", "- SQL"],
                "preferredQualifications": ["<p>Rust &amp; Go</p>"],
                "description": ["<div>Build things</div>"]
            }
        })
    }

    #[test]
    fn test_listing_from_search_result() {
        let listing = JobListing::from_search_result(&search_result("3185242"));
        assert_eq!(listing.job_id, "3185242");
        assert_eq!(listing.title, "Software Development Engineer II");
        assert_eq!(listing.hiring_manager_usernames, vec!["jdoe", "slee"]);
        assert_eq!(listing.hiring_manager_names, vec!["Jane Q. Doe", "Sam (Sammy) Lee"]);
        assert_eq!(listing.recruiter_usernames, vec!["proe"]);
        assert_eq!(listing.basic_qualifications, "- 3+ years\n- Java\n- SQL");
        assert_eq!(listing.preferred_qualifications, "Rust & Go");
        assert_eq!(listing.description, "Build things");
        assert_eq!(listing.first_hiring_manager(), Some("jdoe"));
    }

    #[test]
    fn test_listing_tolerates_missing_fields() {
        let listing = JobListing::from_search_result(&json!({}));
        assert_eq!(listing.job_id, "");
        assert!(listing.hiring_manager_usernames.is_empty());
        assert_eq!(listing.first_hiring_manager(), None);
    }

    fn client_for(server: &mockito::Server, page_size: usize) -> JobsClient {
        let mut environment = EnvironmentConfig::default();
        environment.endpoints.jobs_search_url = format!("{}/v1/jobs/search?query=", server.url());
        environment.limits.jobs_page_size = page_size;
        let config = ConfigManager::from_lookup(environment, |_| None).unwrap();

        let mut manager = CredentialManager::new();
        manager.register_manual(
            Credential::manual(
                AWS_SESSION,
                Secret::Aws(AwsKeys {
                    access_key_id: "AKID".into(),
                    secret_key: "secret".into(),
                    session_token: Some("session".into()),
                }),
                Duration::minutes(30),
            ),
            "AWS_SESSION",
        );

        JobsClient::new(ServiceClient::new(5).unwrap(), Arc::new(manager), &config)
    }

    #[tokio::test]
    async fn test_search_pages_until_found() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/v1/jobs/search")
            .match_query(mockito::Matcher::UrlEncoded("start".into(), "0".into()))
            .match_header("x-amz-security-token", "session")
            .with_status(200)
            .with_body(
                json!({"jobSearchResults": {"found": 3, "searchResults": [search_result("1"), search_result("2")]}})
                    .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v1/jobs/search")
            .match_query(mockito::Matcher::UrlEncoded("start".into(), "2".into()))
            .with_status(200)
            .with_body(
                json!({"jobSearchResults": {"found": 3, "searchResults": [search_result("3")]}})
                    .to_string(),
            )
            .create_async()
            .await;

        let listings = client_for(&server, 2).search().await.unwrap();
        let ids: Vec<_> = listings.iter().map(|l| l.job_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_error_status_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/jobs/search")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body(r#"{"message": "boom"}"#)
            .create_async()
            .await;

        let err = client_for(&server, 20).search().await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_export_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.csv");
        let listing = JobListing::from_search_result(&search_result("42"));

        export_csv(&[listing], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("job_id,title,"));
        assert!(content.contains("42,Software Development Engineer II,Jane Q. Doe; Sam (Sammy) Lee"));
    }
}
