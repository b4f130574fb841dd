// src/talent/mod.rs
//! Clients for the internal talent APIs: job search, job details, employee
//! details and the self-introduction endpoint.

pub mod employees;
pub mod html;
pub mod job_details;
pub mod jobs;
pub mod self_intro;

pub use employees::{EmployeeClient, EmployeeDetails, HierarchyEntry};
pub use job_details::{JobDetails, JobDetailsClient, JobDetailsSource};
pub use jobs::{export_csv, JobListing, JobsClient};
pub use self_intro::SelfIntroSubmitter;

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use url::Url;

use crate::auth::manager::AWS_SESSION;
use crate::auth::{Credential, CredentialManager, SigV4Signer};
use crate::core::{HttpReply, ServiceClient};

/// GET `url` signed with the current AWS session keys.
///
/// A 401/403 forces one refresh of the session and a single retry; the
/// reply is returned whatever its status after that.
pub(crate) async fn signed_get(
    service_name: &str,
    service: &ServiceClient,
    credentials: &Arc<CredentialManager>,
    signer: &SigV4Signer,
    url: &str,
    headers: &[(String, String)],
) -> Result<HttpReply> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    let credential = credentials.get(AWS_SESSION).await?;

    let reply = send_signed(service_name, service, signer, &parsed, headers, &credential).await?;
    if !reply.is_auth_rejection() {
        return Ok(reply);
    }

    app_log!(
        warn,
        "{} rejected the AWS session ({}), refreshing and retrying",
        service_name,
        reply.status
    );
    let credential = credentials.rejected(&credential).await?;
    send_signed(service_name, service, signer, &parsed, headers, &credential).await
}

async fn send_signed(
    service_name: &str,
    service: &ServiceClient,
    signer: &SigV4Signer,
    url: &Url,
    headers: &[(String, String)],
    credential: &Credential,
) -> Result<HttpReply> {
    let signed = signer.sign("GET", url, headers, credential.aws_keys()?, Utc::now())?;
    let mut request = service.http().get(url.as_str());
    for (name, value) in &signed {
        request = request.header(name.as_str(), value.as_str());
    }
    service.send(service_name, request).await
}
