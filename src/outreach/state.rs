// src/outreach/state.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::core::FsOps;

/// Job ids already emailed, kept across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentState {
    #[serde(default)]
    pub sent_jobs: BTreeSet<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_sent: usize,
}

impl SentState {
    /// A missing file is an empty state. A file that exists but cannot be
    /// read is an error, so the sent history is never silently replaced.
    pub async fn load(path: &Path) -> Result<Self> {
        let state = FsOps::read_json::<SentState>(path)
            .await
            .with_context(|| format!("Unreadable sent-emails state {}", path.display()))?
            .unwrap_or_default();
        app_log!(
            info,
            "Loaded state: {} jobs already sent (last run: {:?})",
            state.sent_jobs.len(),
            state.last_run
        );
        Ok(state)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.sent_jobs.contains(job_id)
    }

    /// Add newly sent ids and stamp the run.
    pub fn merge<I: IntoIterator<Item = String>>(&mut self, job_ids: I) {
        self.sent_jobs.extend(job_ids);
        self.total_sent = self.sent_jobs.len();
        self.last_run = Some(Utc::now());
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        FsOps::write_json_atomic(path, self).await?;
        app_log!(info, "Saved state: {} total jobs sent", self.total_sent);
        Ok(())
    }
}

/// RFC 3339 timestamps, or naive ISO ones taken as local time.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let naive = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| serde::de::Error::custom(format!("invalid last_run {:?}: {}", raw, e)))?;
    Ok(naive
        .and_local_timezone(Local)
        .earliest()
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|| Some(naive.and_utc())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_emails_state.json");
        assert_eq!(SentState::load(&path).await.unwrap(), SentState::default());

        let mut state = SentState::default();
        state.merge(vec!["20".to_string(), "3".to_string()]);
        state.merge(vec!["3".to_string()]);
        state.save(&path).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw["sent_jobs"], serde_json::json!(["20", "3"]));
        assert_eq!(raw["total_sent"], 2);

        let loaded = SentState::load(&path).await.unwrap();
        assert!(loaded.contains("20"));
        assert!(loaded.last_run.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let err = SentState::load(&path).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Unreadable sent-emails state"));
    }

    #[tokio::test]
    async fn test_naive_last_run_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_emails_state.json");
        tokio::fs::write(
            &path,
            r#"{"sent_jobs":["111","222"],"last_run":"2025-10-01T12:34:56.123456","total_sent":2}"#,
        )
        .await
        .unwrap();

        let mut state = SentState::load(&path).await.unwrap();
        assert!(state.contains("111"));
        assert!(state.last_run.is_some());

        state.merge(vec!["333".to_string()]);
        state.save(&path).await.unwrap();
        let reloaded = SentState::load(&path).await.unwrap();
        assert_eq!(reloaded.sent_jobs.len(), 3);
        assert_eq!(reloaded.total_sent, 3);
    }

    #[test]
    fn test_offset_and_missing_last_run() {
        let state: SentState =
            serde_json::from_str(r#"{"sent_jobs":["1"],"last_run":"2025-10-01T12:00:00+02:00"}"#).unwrap();
        assert_eq!(state.last_run.unwrap().to_rfc3339(), "2025-10-01T10:00:00+00:00");

        let state: SentState = serde_json::from_str(r#"{"sent_jobs":["1"]}"#).unwrap();
        assert!(state.last_run.is_none());
        assert_eq!(state.total_sent, 0);
    }
}
