// src/pipeline/report.rs
//! Consolidated view of every request item, rebuilt after each live submit run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::item::{ItemState, PipelineItem};
use crate::core::FsOps;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub job_id: String,
    pub status: ItemState,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub responses_generated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub processed: BTreeMap<String, ReportEntry>,
    pub not_processed: BTreeMap<String, ReportEntry>,
    pub last_run: Option<DateTime<Utc>>,
    pub total_processed: usize,
    pub total_not_processed: usize,
}

impl SubmissionReport {
    /// Submitted items are processed; everything else is not.
    pub fn from_items(items: &[PipelineItem]) -> Self {
        let mut report = Self::default();

        for item in items {
            let entry = ReportEntry {
                job_id: item.job_id.clone(),
                status: item.state,
                reason: item.reason.clone(),
                timestamp: item.updated_at,
                job_title: item.job_title.clone(),
                department: item.department.clone(),
                responses_generated: item.has_payload(),
            };
            if item.is_submitted() {
                report.processed.insert(item.job_id.clone(), entry);
            } else {
                report.not_processed.insert(item.job_id.clone(), entry);
            }
        }

        report.total_processed = report.processed.len();
        report.total_not_processed = report.not_processed.len();
        report.last_run = Some(Utc::now());
        report
    }

    pub async fn load(path: &Path) -> Result<Self> {
        Ok(FsOps::read_json(path).await?.unwrap_or_default())
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        FsOps::write_json_atomic(path, self).await
    }
}
