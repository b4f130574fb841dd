// src/pipeline/discovery.rs
//! Which job ids a stage should work on when none are given explicitly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use super::store::ItemStore;
use crate::core::FsOps;
use crate::matching::record::record_path;
use crate::matching::{load_records, MatchRecord, Verdict};

#[derive(Debug, Deserialize)]
struct SentJobsFile {
    sent_jobs: Vec<serde_json::Value>,
}

/// YES decisions from the matcher that have no generated payload yet.
pub async fn yes_ids_without_payload(per_job_dir: &Path, store: &ItemStore) -> Result<Vec<String>> {
    let yes: Vec<MatchRecord> = load_records(per_job_dir)
        .await?
        .into_iter()
        .filter(MatchRecord::is_yes)
        .collect();
    info!("Found {} YES-decision job(s) from the matcher", yes.len());

    let mut pending = Vec::new();
    for record in yes {
        match store.load(&record.job_id).await {
            Ok(Some(item)) if item.has_payload() => {}
            Ok(_) => pending.push(record.job_id),
            Err(e) => warn!("Failed to read state for {}: {:#}", record.job_id, e),
        }
    }
    Ok(pending)
}

/// Job ids from a `{"sent_jobs": [...]}` file, such as the mailer's state.
pub async fn ids_from_sent_file(path: &Path) -> Result<Vec<String>> {
    let file: SentJobsFile = FsOps::read_json(path)
        .await?
        .with_context(|| format!("File not found: {}", path.display()))?;

    let ids: Vec<String> = file
        .sent_jobs
        .iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .collect();
    info!("Loaded {} job IDs from {}", ids.len(), path.display());
    Ok(ids)
}

/// Drop ids the matcher decided against; ids it never saw pass through.
pub async fn keep_yes_decisions(ids: Vec<String>, per_job_dir: &Path) -> Vec<String> {
    let mut kept = Vec::new();
    let mut rejected = Vec::new();

    for id in ids {
        match FsOps::read_json::<MatchRecord>(&record_path(per_job_dir, &id)).await {
            Ok(Some(record)) if record.decision != Verdict::Yes => {
                rejected.push(format!("{}({})", id, record.decision))
            }
            _ => kept.push(id),
        }
    }

    if !rejected.is_empty() {
        warn!("Skipping {} non-YES job(s): {}", rejected.len(), rejected.join(", "));
    }
    kept
}

/// Every item with a generated payload, submitted or not.
pub async fn ids_with_payload(store: &ItemStore) -> Result<Vec<String>> {
    Ok(store
        .list()
        .await?
        .into_iter()
        .filter(|item| item.has_payload())
        .map(|item| item.job_id)
        .collect())
}
