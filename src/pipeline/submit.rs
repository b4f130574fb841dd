// src/pipeline/submit.rs
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use super::item::{is_valid_job_id, GeneratedResponses, Stage};
use super::limiter::ConcurrencyLimiter;
use super::outcome::{dedup_ids, tally, ItemOutcome, OutcomeStatus};
use super::report::SubmissionReport;
use super::store::ItemStore;

/// Sends a generated payload to the remote API.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, job_id: &str, responses: &GeneratedResponses) -> Result<()>;

    /// Human-readable description of what `submit` would send, secrets redacted.
    fn preview(&self, job_id: &str, responses: &GeneratedResponses) -> String;
}

/// Second stage: submit generated payloads.
pub struct SubmitStage {
    store: ItemStore,
    submitter: Arc<dyn Submitter>,
    limiter: ConcurrencyLimiter,
    report_path: PathBuf,
}

impl SubmitStage {
    pub fn new(
        store: ItemStore,
        submitter: Arc<dyn Submitter>,
        limiter: ConcurrencyLimiter,
        report_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            submitter,
            limiter,
            report_path: report_path.into(),
        }
    }

    /// One outcome per distinct job id, in input order. A live run rebuilds
    /// the consolidated report afterwards; a dry run writes nothing.
    pub async fn run<S: AsRef<str>>(
        &self,
        job_ids: &[S],
        force: bool,
        dry_run: bool,
    ) -> Result<Vec<ItemOutcome>> {
        let job_ids = dedup_ids(job_ids);
        info!(
            "{} {} job(s) with concurrency {}",
            if dry_run { "Previewing" } else { "Submitting" },
            job_ids.len(),
            self.limiter.max_concurrent()
        );

        let outcomes: Vec<ItemOutcome> = join_all(job_ids.iter().map(|job_id| async move {
            if !is_valid_job_id(job_id) {
                return ItemOutcome::failed(job_id.as_str(), "Invalid job id");
            }
            match self.limiter.run(self.process(job_id, force, dry_run)).await {
                Ok(outcome) => outcome,
                Err(e) => ItemOutcome::failed(job_id.as_str(), format!("{:#}", e)),
            }
        }))
        .await;

        if !dry_run {
            let report = SubmissionReport::from_items(&self.store.list().await?);
            report.save(&self.report_path).await?;
            info!(
                "Report written to {}: {} processed, {} not processed",
                self.report_path.display(),
                report.total_processed,
                report.total_not_processed
            );
        }

        info!("Submit run finished: {}", tally(&outcomes));
        Ok(outcomes)
    }

    async fn process(&self, job_id: &str, force: bool, dry_run: bool) -> ItemOutcome {
        let mut item = match self.store.load(job_id).await {
            Ok(Some(item)) => item,
            Ok(None) => return ItemOutcome::failed(job_id, "No generated payload"),
            Err(e) => return ItemOutcome::failed(job_id, format!("Unreadable state: {:#}", e)),
        };

        if item.is_submitted() && !force {
            info!("Job {}: already submitted, skipping", job_id);
            return ItemOutcome::new(job_id, OutcomeStatus::Skipped, "Already submitted");
        }

        let responses = match item.responses.clone() {
            Some(responses) => responses,
            None => return ItemOutcome::failed(job_id, "No generated payload"),
        };

        if dry_run {
            info!("DRY RUN job {}:\n{}", job_id, self.submitter.preview(job_id, &responses));
            return ItemOutcome::new(job_id, OutcomeStatus::DryRun, "Dry run, nothing sent");
        }

        let recorded = match self.submitter.submit(job_id, &responses).await {
            Ok(()) => {
                info!("Job {}: submitted", job_id);
                item.record_submitted(force)
                    .map(|_| ItemOutcome::new(job_id, OutcomeStatus::Submitted, item.reason.clone()))
            }
            Err(e) => {
                error!("Job {}: submission failed: {:#}", job_id, e);
                let reason = format!("Submission failed: {:#}", e);
                item.record_failure(Stage::Submit, reason.clone(), force)
                    .map(|_| ItemOutcome::failed(job_id, reason))
            }
        };

        let outcome = match recorded {
            Ok(outcome) => outcome,
            Err(e) => return ItemOutcome::failed(job_id, format!("{:#}", e)),
        };

        match self.store.save(&item).await {
            Ok(()) => outcome,
            Err(e) => ItemOutcome::failed(job_id, format!("Failed to save state: {:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::item::{ItemState, PipelineItem};
    use crate::pipeline::testing::{responses_for, FakeSubmitter};
    use std::path::Path;

    async fn seed(store: &ItemStore, ids: &[&str]) {
        for id in ids {
            let mut item = PipelineItem::new(*id);
            item.record_generated(responses_for(id), None, None, false).unwrap();
            store.save(&item).await.unwrap();
        }
    }

    fn stage(dir: &Path, submitter: Arc<FakeSubmitter>, limit: usize) -> SubmitStage {
        SubmitStage::new(
            ItemStore::new(dir.join("state")),
            submitter,
            ConcurrencyLimiter::new(limit).unwrap(),
            dir.join("request_informational_results.json"),
        )
    }

    #[tokio::test]
    async fn test_submitted_items_are_not_resubmitted() {
        let dir = tempfile::tempdir().unwrap();
        let submitter = Arc::new(FakeSubmitter::default());
        let stage = stage(dir.path(), submitter.clone(), 10);
        seed(&ItemStore::new(dir.path().join("state")), &["1", "2"]).await;

        let first = stage.run(&["1", "2"], false, false).await.unwrap();
        assert!(first.iter().all(|o| o.status == OutcomeStatus::Submitted));

        let second = stage.run(&["1", "2"], false, false).await.unwrap();
        assert!(second.iter().all(|o| o.status == OutcomeStatus::Skipped));
        assert_eq!(submitter.sent().len(), 2);

        let forced = stage.run(&["1"], true, false).await.unwrap();
        assert_eq!(forced[0].status, OutcomeStatus::Submitted);
        assert_eq!(submitter.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_rerun_after_partial_failure_retries_only_failures() {
        let dir = tempfile::tempdir().unwrap();
        let submitter = Arc::new(FakeSubmitter::failing(&["2"]));
        let stage = stage(dir.path(), submitter.clone(), 10);
        let store = ItemStore::new(dir.path().join("state"));
        seed(&store, &["1", "2", "3"]).await;

        let first = stage.run(&["1", "2", "3"], false, false).await.unwrap();
        assert_eq!(first.iter().filter(|o| o.is_failure()).count(), 1);

        let failed = store.load("2").await.unwrap().unwrap();
        assert_eq!(failed.state, ItemState::Failed);
        assert!(failed.has_payload());

        let report = SubmissionReport::load(&dir.path().join("request_informational_results.json"))
            .await
            .unwrap();
        assert_eq!(report.total_processed, 2);
        assert!(report.not_processed.contains_key("2"));

        submitter.heal();
        let second = stage.run(&["1", "2", "3"], false, false).await.unwrap();
        assert_eq!(second[0].status, OutcomeStatus::Skipped);
        assert_eq!(second[1].status, OutcomeStatus::Submitted);
        assert_eq!(second[2].status, OutcomeStatus::Skipped);
        let mut sent = submitter.sent();
        sent.sort();
        assert_eq!(sent, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_missing_payload_fails() {
        let dir = tempfile::tempdir().unwrap();
        let stage = stage(dir.path(), Arc::new(FakeSubmitter::default()), 10);
        let store = ItemStore::new(dir.path().join("state"));
        let mut failed = PipelineItem::new("5");
        failed.record_failure(Stage::Generate, "no details", false).unwrap();
        store.save(&failed).await.unwrap();

        let outcomes = stage.run(&["5", "6"], false, false).await.unwrap();
        assert!(outcomes.iter().all(|o| o.is_failure()));
        assert!(outcomes[1].reason.contains("No generated payload"));
    }

    #[tokio::test]
    async fn test_dry_run_sends_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let submitter = Arc::new(FakeSubmitter::default());
        let stage = stage(dir.path(), submitter.clone(), 10);
        let store = ItemStore::new(dir.path().join("state"));
        seed(&store, &["1"]).await;
        let before = tokio::fs::read_to_string(dir.path().join("state/1.json")).await.unwrap();

        let outcomes = stage.run(&["1"], false, true).await.unwrap();
        assert_eq!(outcomes[0].status, OutcomeStatus::DryRun);
        assert!(submitter.sent().is_empty());

        let after = tokio::fs::read_to_string(dir.path().join("state/1.json")).await.unwrap();
        assert_eq!(before, after);
        assert!(!dir.path().join("request_informational_results.json").exists());
    }

    #[tokio::test]
    async fn test_concurrency_limit_and_one_outcome_each() {
        let dir = tempfile::tempdir().unwrap();
        let submitter = Arc::new(FakeSubmitter::default());
        let stage = stage(dir.path(), submitter.clone(), 3);
        let ids: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        seed(&ItemStore::new(dir.path().join("state")), &refs).await;

        let outcomes = stage.run(&ids, false, false).await.unwrap();
        assert_eq!(outcomes.len(), 12);
        assert!(outcomes.iter().all(|o| o.status == OutcomeStatus::Submitted));
        assert!(submitter.gauge.peak() <= 3);
    }
}
