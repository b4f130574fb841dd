// src/matching/record.rs
//! Per-job match records and the aggregated results file built from them.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::scorer::{Confidence, MatchDecision, Verdict};
use crate::core::FsOps;
use crate::talent::{HierarchyEntry, JobListing};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFailure {
    pub stage: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub timestamp: DateTime<Utc>,
    pub job_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub hiring_manager_usernames: Vec<String>,
    #[serde(default)]
    pub hiring_manager_names: Vec<String>,
    #[serde(default)]
    pub recruiter_usernames: Vec<String>,
    /// Hiring manager first, then their management chain
    #[serde(default)]
    pub employee_hierarchy: Option<Vec<HierarchyEntry>>,
    pub decision: Verdict,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub summary_50w: Option<String>,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub error: Option<MatchFailure>,
}

impl MatchRecord {
    pub fn decided(
        listing: &JobListing,
        decision: &MatchDecision,
        hierarchy: Option<Vec<HierarchyEntry>>,
    ) -> Self {
        let mut matched_keywords = decision.matched_required.clone();
        matched_keywords.extend(decision.matched_preferred.iter().cloned());

        Self {
            timestamp: Utc::now(),
            job_id: listing.job_id.clone(),
            title: listing.title.clone(),
            hiring_manager_usernames: listing.hiring_manager_usernames.clone(),
            hiring_manager_names: listing.hiring_manager_names.clone(),
            recruiter_usernames: listing.recruiter_usernames.clone(),
            employee_hierarchy: hierarchy,
            decision: decision.decision,
            confidence: Some(decision.confidence),
            score: Some(decision.score),
            summary_50w: Some(decision.summary.clone()),
            matched_keywords,
            error: None,
        }
    }

    pub fn failed(listing: &JobListing, stage: &str, err: &anyhow::Error) -> Self {
        let kind = if err.downcast_ref::<crate::auth::AuthError>().is_some() {
            "AuthError"
        } else {
            "Error"
        };

        Self {
            timestamp: Utc::now(),
            job_id: listing.job_id.clone(),
            title: listing.title.clone(),
            hiring_manager_usernames: listing.hiring_manager_usernames.clone(),
            hiring_manager_names: listing.hiring_manager_names.clone(),
            recruiter_usernames: listing.recruiter_usernames.clone(),
            employee_hierarchy: None,
            decision: Verdict::Error,
            confidence: None,
            score: None,
            summary_50w: None,
            matched_keywords: Vec::new(),
            error: Some(MatchFailure {
                stage: stage.to_string(),
                kind: kind.to_string(),
                message: format!("{:#}", err),
            }),
        }
    }

    pub fn is_yes(&self) -> bool {
        self.decision == Verdict::Yes
    }

    /// Sort key for the YES ranking: score, then confidence.
    fn rank(&self) -> (u32, u8) {
        (
            self.score.unwrap_or(0),
            self.confidence.map_or(0, Confidence::rank),
        )
    }
}

pub fn record_path(per_job_dir: &Path, job_id: &str) -> PathBuf {
    per_job_dir.join(format!("{}.json", job_id))
}

pub async fn save_record(per_job_dir: &Path, record: &MatchRecord) -> Result<()> {
    FsOps::write_json_atomic(&record_path(per_job_dir, &record.job_id), record).await
}

/// Every readable record in `per_job_dir`; unreadable files are skipped.
pub async fn load_records(per_job_dir: &Path) -> Result<Vec<MatchRecord>> {
    let mut records = Vec::new();
    for path in FsOps::list_json_files(per_job_dir).await? {
        match FsOps::read_json::<MatchRecord>(&path).await {
            Ok(Some(record)) if !record.job_id.trim().is_empty() => records.push(record),
            Ok(_) => {}
            Err(e) => app_log!(warn, "Could not read {}; ignoring: {:#}", path.display(), e),
        }
    }
    Ok(records)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCounts {
    pub total: usize,
    pub yes: usize,
    pub no: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchAggregate {
    #[serde(default)]
    pub yes_ranked: Vec<MatchRecord>,
    #[serde(default)]
    pub no_audit: Vec<MatchRecord>,
    #[serde(default)]
    pub counts: MatchCounts,
}

impl MatchAggregate {
    /// Merge `existing` with `per_job`; per-job records win on conflicts.
    pub fn merge(existing: MatchAggregate, per_job: Vec<MatchRecord>) -> Self {
        let mut by_id: BTreeMap<String, MatchRecord> = BTreeMap::new();
        for record in existing.yes_ranked.into_iter().chain(existing.no_audit) {
            by_id.insert(record.job_id.trim().to_string(), record);
        }
        for record in per_job {
            by_id.insert(record.job_id.trim().to_string(), record);
        }

        let (mut yes_ranked, no_audit): (Vec<_>, Vec<_>) =
            by_id.into_values().partition(MatchRecord::is_yes);
        yes_ranked.sort_by(|a, b| b.rank().cmp(&a.rank()));

        let counts = MatchCounts {
            total: yes_ranked.len() + no_audit.len(),
            yes: yes_ranked.len(),
            no: no_audit.len(),
        };
        Self {
            yes_ranked,
            no_audit,
            counts,
        }
    }

    /// Ids with a final decision; `ERROR` records are left for a retry.
    pub fn processed_ids(&self) -> BTreeSet<String> {
        self.yes_ranked
            .iter()
            .chain(&self.no_audit)
            .filter(|r| r.decision != Verdict::Error)
            .map(|r| r.job_id.trim().to_string())
            .collect()
    }

    /// Rebuild the results file from itself plus `per_job_dir` and write it back.
    pub async fn rebuild(results_path: &Path, per_job_dir: &Path) -> Result<Self> {
        let existing = match FsOps::read_json::<MatchAggregate>(results_path).await {
            Ok(existing) => existing.unwrap_or_default(),
            Err(e) => {
                app_log!(warn, "Could not read {}; treating as empty: {:#}", results_path.display(), e);
                MatchAggregate::default()
            }
        };

        let aggregate = Self::merge(existing, load_records(per_job_dir).await?);
        FsOps::write_json_atomic(results_path, &aggregate).await?;
        Ok(aggregate)
    }
}
