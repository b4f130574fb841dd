// src/pipeline/testing.rs
//! Fakes for the pipeline seams.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::generator::ResponseGenerator;
use super::item::GeneratedResponses;
use super::submit::Submitter;
use crate::talent::{JobDetails, JobDetailsSource};

/// Tracks how many calls are running at once.
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub fn responses_for(job_id: &str) -> GeneratedResponses {
    GeneratedResponses {
        interest_reason: format!("interest in {}", job_id),
        qualifications: format!("qualified for {}", job_id),
        forte_context: "review".to_string(),
    }
}

#[derive(Default)]
pub struct FakeDetails {
    missing: HashSet<String>,
}

impl FakeDetails {
    pub fn missing(ids: &[&str]) -> Self {
        Self {
            missing: ids.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl JobDetailsSource for FakeDetails {
    async fn details(&self, job_id: &str) -> Result<JobDetails> {
        if self.missing.contains(job_id) {
            anyhow::bail!("Job {} not found (404)", job_id);
        }
        Ok(JobDetails(json!({
            "job": {"role": {"title": format!("Title {}", job_id)}, "department": {"name": "Dept"}}
        })))
    }
}

#[derive(Default)]
pub struct FakeGenerator {
    calls: AtomicUsize,
    pub gauge: Gauge,
}

impl FakeGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseGenerator for FakeGenerator {
    async fn generate(&self, job_id: &str, _details: &JobDetails) -> Result<GeneratedResponses> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gauge.enter();
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.gauge.exit();
        Ok(responses_for(job_id))
    }
}

/// Submitter whose failures are scripted per job id.
#[derive(Default)]
pub struct FakeSubmitter {
    failing: Mutex<HashSet<String>>,
    sent: Mutex<Vec<String>>,
    pub gauge: Gauge,
}

impl FakeSubmitter {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            failing: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Submitter for FakeSubmitter {
    async fn submit(&self, job_id: &str, _responses: &GeneratedResponses) -> Result<()> {
        self.gauge.enter();
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.gauge.exit();

        if self.failing.lock().unwrap().contains(job_id) {
            anyhow::bail!("Request failed with status 500");
        }
        self.sent.lock().unwrap().push(job_id.to_string());
        Ok(())
    }

    fn preview(&self, job_id: &str, _responses: &GeneratedResponses) -> String {
        format!("would submit {}", job_id)
    }
}
