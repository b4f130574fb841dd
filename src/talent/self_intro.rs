// src/talent/self_intro.rs
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::manager::SELF_INTRO_TOKEN;
use crate::auth::{Credential, CredentialManager};
use crate::core::config_manager::require;
use crate::core::service_client::preview;
use crate::core::{ConfigManager, HttpReply, ServiceClient};
use crate::matching::Accomplishment;
use crate::pipeline::generator::clean_responses;
use crate::pipeline::{GeneratedResponses, Submitter};

const SERVICE: &str = "self-introduction";

#[derive(Debug, Serialize)]
struct JobRef<'a> {
    icims: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelfIntroPayload<'a> {
    accomplishments: &'a [Accomplishment],
    candidate_people_soft_id: &'a str,
    job_id: JobRef<'a>,
    qualifications: String,
    self_introduction: String,
    forte_context: String,
    share_forte: bool,
}

/// Posts informational requests to the self-introduction endpoint.
pub struct SelfIntroSubmitter {
    service: ServiceClient,
    credentials: Arc<CredentialManager>,
    url: String,
    origin: String,
    requester_id: String,
    accomplishments: Vec<Accomplishment>,
}

impl SelfIntroSubmitter {
    pub fn new(
        service: ServiceClient,
        credentials: Arc<CredentialManager>,
        config: &ConfigManager,
        accomplishments: Vec<Accomplishment>,
    ) -> Result<Self> {
        let requester_id = require(&config.requester_people_soft_id, "REQUESTER_PEOPLE_SOFT_ID")?;
        let endpoints = &config.environment.endpoints;
        Ok(Self {
            service,
            credentials,
            url: endpoints.self_intro_url.clone(),
            origin: endpoints.self_intro_origin.trim_end_matches('/').to_string(),
            requester_id: requester_id.to_string(),
            accomplishments,
        })
    }

    fn payload<'a>(&'a self, job_id: &'a str, responses: &GeneratedResponses) -> SelfIntroPayload<'a> {
        let cleaned = clean_responses(responses.clone());
        SelfIntroPayload {
            accomplishments: &self.accomplishments,
            candidate_people_soft_id: &self.requester_id,
            job_id: JobRef { icims: job_id },
            qualifications: cleaned.qualifications,
            self_introduction: cleaned.interest_reason,
            forte_context: cleaned.forte_context,
            share_forte: true,
        }
    }

    fn headers(&self, authorization: &str) -> Vec<(&'static str, String)> {
        vec![
            ("accept", "application/json, text/plain, */*".to_string()),
            ("authorization", authorization.to_string()),
            ("content-type", "application/json".to_string()),
            ("origin", self.origin.clone()),
            ("referer", format!("{}/", self.origin)),
        ]
    }

    async fn post(
        &self,
        credential: &Credential,
        payload: &SelfIntroPayload<'_>,
    ) -> Result<HttpReply> {
        let mut request = self
            .service
            .http()
            .post(&self.url)
            .query(&[("requesterPeopleSoftId", self.requester_id.as_str())])
            .json(payload);
        for (name, value) in self.headers(credential.token()?) {
            request = request.header(name, value);
        }
        self.service.send(SERVICE, request).await
    }
}

#[async_trait]
impl Submitter for SelfIntroSubmitter {
    async fn submit(&self, job_id: &str, responses: &GeneratedResponses) -> Result<()> {
        let payload = self.payload(job_id, responses);
        let credential = self.credentials.get(SELF_INTRO_TOKEN).await?;

        app_log!(info, "Submitting informational request for job {}", job_id);
        let mut reply = self.post(&credential, &payload).await?;
        if reply.is_auth_rejection() {
            app_log!(warn, "Self-introduction token rejected ({}), refreshing", reply.status);
            let credential = self.credentials.rejected(&credential).await?;
            reply = self.post(&credential, &payload).await?;
        }

        match reply.status {
            200 | 201 => Ok(()),
            status => anyhow::bail!(
                "Request failed with status {}: {}",
                status,
                preview(&reply.body, 300)
            ),
        }
    }

    fn preview(&self, job_id: &str, responses: &GeneratedResponses) -> String {
        let headers: serde_json::Map<String, serde_json::Value> = self
            .headers("***REDACTED***")
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into()))
            .collect();
        let payload = serde_json::to_string_pretty(&self.payload(job_id, responses))
            .unwrap_or_default();
        format!(
            "POST {}?requesterPeopleSoftId={}\nHeaders: {}\nPayload: {}",
            self.url,
            self.requester_id,
            serde_json::Value::Object(headers),
            payload
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::FakeExchange;
    use crate::auth::{RefreshableCredential, Secret};
    use crate::environment::EnvironmentConfig;
    use chrono::Duration;
    use mockito::Matcher;

    fn responses() -> GeneratedResponses {
        GeneratedResponses {
            interest_reason: " I like ledgers. ".into(),
            qualifications: "Rust, Java".into(),
            forte_context: "Summary: Raised the bar.".into(),
        }
    }

    fn submitter(
        server: &mockito::Server,
        exchange: Arc<FakeExchange>,
        requester: Option<&str>,
    ) -> Result<SelfIntroSubmitter> {
        let mut environment = EnvironmentConfig::default();
        environment.endpoints.self_intro_url = format!("{}/v1/selfIntroduction", server.url());
        environment.endpoints.self_intro_origin = "https://aboutme.example".into();
        let requester = requester.map(str::to_string);
        let config = ConfigManager::from_lookup(environment, move |key| match key {
            "REQUESTER_PEOPLE_SOFT_ID" => requester.clone(),
            _ => None,
        })?;

        let mut manager = CredentialManager::new();
        manager.register_refreshable(
            RefreshableCredential::new(SELF_INTRO_TOKEN, exchange, Some("r0".into())).with_initial(
                Credential::manual(
                    SELF_INTRO_TOKEN,
                    Secret::Token("stale".into()),
                    Duration::hours(1),
                ),
            ),
        );
        let accomplishments = vec![Accomplishment {
            title: "Ledger migration".into(),
            link: "https://wiki.example/ledger".into(),
        }];
        SelfIntroSubmitter::new(
            ServiceClient::new(5)?,
            Arc::new(manager),
            &config,
            accomplishments,
        )
    }

    #[tokio::test]
    async fn test_submit_sends_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/selfIntroduction")
            .match_query(Matcher::UrlEncoded("requesterPeopleSoftId".into(), "777".into()))
            .match_header("authorization", "stale")
            .match_header("origin", "https://aboutme.example")
            .match_header("referer", "https://aboutme.example/")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "candidatePeopleSoftId": "777",
                "jobId": {"icims": "3185242"},
                "selfIntroduction": "I like ledgers.",
                "forteContext": "Raised the bar.",
                "shareForte": true
            })))
            .with_status(201)
            .create_async()
            .await;

        let exchange = Arc::new(FakeExchange::new());
        let submitter = submitter(&server, exchange.clone(), Some("777")).unwrap();
        submitter.submit("3185242", &responses()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(exchange.calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_once() {
        let mut server = mockito::Server::new_async().await;
        let rejected = server
            .mock("POST", "/v1/selfIntroduction")
            .match_query(Matcher::Any)
            .match_header("authorization", "stale")
            .with_status(401)
            .create_async()
            .await;
        let accepted = server
            .mock("POST", "/v1/selfIntroduction")
            .match_query(Matcher::Any)
            .match_header("authorization", "token-1")
            .with_status(200)
            .create_async()
            .await;

        let exchange = Arc::new(FakeExchange::new());
        let submitter = submitter(&server, exchange.clone(), Some("777")).unwrap();
        submitter.submit("1", &responses()).await.unwrap();

        rejected.assert_async().await;
        accepted.assert_async().await;
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn test_server_error_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/selfIntroduction")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let submitter = submitter(&server, Arc::new(FakeExchange::new()), Some("777")).unwrap();
        let err = submitter.submit("1", &responses()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("status 500"));
    }

    #[tokio::test]
    async fn test_preview_redacts_token() {
        let server = mockito::Server::new_async().await;
        let submitter = submitter(&server, Arc::new(FakeExchange::new()), Some("777")).unwrap();
        let preview = submitter.preview("42", &responses());
        assert!(preview.contains("REDACTED"));
        assert!(!preview.contains("stale"));
        assert!(preview.contains("\"icims\": \"42\""));
    }

    #[tokio::test]
    async fn test_requester_id_is_required() {
        let server = mockito::Server::new_async().await;
        assert!(submitter(&server, Arc::new(FakeExchange::new()), None).is_err());
    }
}
