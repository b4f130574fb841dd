// src/core/service_client.rs
//! Shared HTTP client for the talent, mail and completion APIs

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::AuthError;

const MAX_LOGGED_BODY: usize = 500;

/// Status, content type and body of a finished request.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_auth_rejection(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    /// A login page served in place of the API response
    pub fn is_html(&self) -> bool {
        let declared = self
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("text/html"));
        let body = self.body.trim_start().to_lowercase();
        declared || body.starts_with("<!doctype html") || body.starts_with("<html")
    }

    pub fn json<R: DeserializeOwned>(&self) -> Result<R> {
        serde_json::from_str(&self.body).with_context(|| {
            format!(
                "Failed to parse JSON response: {}",
                preview(&self.body, MAX_LOGGED_BODY)
            )
        })
    }

    /// Map a non-success reply to an error; 401/403 become [`AuthError::Rejected`].
    pub fn error_for_status(self, service: &str) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        if self.is_auth_rejection() {
            return Err(AuthError::Rejected {
                service: service.to_string(),
                status: self.status,
            }
            .into());
        }
        app_log!(error, "{} error response: {}", service, preview(&self.body, MAX_LOGGED_BODY));
        anyhow::bail!(
            "{} returned error status {}: {}",
            service,
            self.status,
            preview(&self.body, MAX_LOGGED_BODY)
        )
    }
}

#[derive(Clone)]
pub struct ServiceClient {
    client: reqwest::Client,
}

impl ServiceClient {
    /// Create new service client with configuration
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send a prepared request and collect the reply whatever its status.
    pub async fn send(&self, service: &str, request: RequestBuilder) -> Result<HttpReply> {
        let response = request
            .send()
            .await
            .with_context(|| format!("HTTP request to {} failed", service))?;

        let status = response.status().as_u16();
        app_log!(trace, "{} response status: {}", service, status);

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read {} response body", service))?;

        Ok(HttpReply {
            status,
            content_type,
            body,
        })
    }

    /// Generic POST request with JSON
    pub async fn post_json<T, R>(
        &self,
        service: &str,
        url: &str,
        headers: &[(String, String)],
        payload: &T,
    ) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.client.post(url).json(payload);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        self.send(service, request)
            .await?
            .error_for_status(service)?
            .json()
    }
}

/// First `max` characters of a body, for logs and error messages.
pub fn preview(body: &str, max: usize) -> String {
    if body.chars().count() <= max {
        body.to_string()
    } else {
        format!("{}...", body.chars().take(max).collect::<String>())
    }
}

/// True when `err` carries a credential rejection from a remote API.
pub fn is_auth_rejection(err: &anyhow::Error) -> bool {
    err.downcast_ref::<AuthError>()
        .is_some_and(|e| matches!(e, AuthError::Rejected { .. }))
}
