// src/pipeline/generate.rs
use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::generator::ResponseGenerator;
use super::item::{is_valid_job_id, Stage};
use super::limiter::ConcurrencyLimiter;
use super::outcome::{dedup_ids, tally, ItemOutcome, OutcomeStatus};
use super::store::ItemStore;
use crate::talent::JobDetailsSource;

/// First stage: fetch job details and generate the request payload.
pub struct GenerateStage {
    store: ItemStore,
    details: Arc<dyn JobDetailsSource>,
    generator: Arc<dyn ResponseGenerator>,
    limiter: ConcurrencyLimiter,
}

impl GenerateStage {
    pub fn new(
        store: ItemStore,
        details: Arc<dyn JobDetailsSource>,
        generator: Arc<dyn ResponseGenerator>,
        limiter: ConcurrencyLimiter,
    ) -> Self {
        Self {
            store,
            details,
            generator,
            limiter,
        }
    }

    /// One outcome per distinct job id, in input order.
    pub async fn run<S: AsRef<str>>(&self, job_ids: &[S], force: bool) -> Result<Vec<ItemOutcome>> {
        let job_ids = dedup_ids(job_ids);
        info!(
            "Generating responses for {} job(s) with concurrency {}",
            job_ids.len(),
            self.limiter.max_concurrent()
        );

        let outcomes: Vec<ItemOutcome> = join_all(job_ids.iter().map(|job_id| async move {
            if !is_valid_job_id(job_id) {
                return ItemOutcome::failed(job_id.as_str(), "Invalid job id");
            }
            match self.limiter.run(self.process(job_id, force)).await {
                Ok(outcome) => outcome,
                Err(e) => ItemOutcome::failed(job_id.as_str(), format!("{:#}", e)),
            }
        }))
        .await;

        info!("Generate run finished: {}", tally(&outcomes));
        Ok(outcomes)
    }

    async fn process(&self, job_id: &str, force: bool) -> ItemOutcome {
        let mut item = match self.store.load_or_new(job_id).await {
            Ok(item) => item,
            Err(e) => return ItemOutcome::failed(job_id, format!("Unreadable state: {:#}", e)),
        };

        if item.has_payload() && !force {
            info!("Job {}: responses already generated, skipping", job_id);
            return ItemOutcome::new(job_id, OutcomeStatus::Skipped, "Responses already generated");
        }

        let result = async {
            let details = self
                .details
                .details(job_id)
                .await
                .map_err(|e| e.context("Failed to fetch job details"))?;
            let responses = self
                .generator
                .generate(job_id, &details)
                .await
                .map_err(|e| e.context("Failed to generate responses"))?;
            anyhow::Ok((details, responses))
        }
        .await;

        let outcome = match result {
            Ok((details, responses)) => {
                let title = details.title().map(str::to_string);
                let department = details.department().map(str::to_string);
                item.record_generated(responses, title, department, force)
                    .map(|_| ItemOutcome::new(job_id, OutcomeStatus::Generated, item.reason.clone()))
            }
            Err(e) => {
                error!("Job {}: {:#}", job_id, e);
                let reason = format!("{:#}", e);
                item.record_failure(Stage::Generate, reason.clone(), force)
                    .map(|_| ItemOutcome::failed(job_id, reason))
            }
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => return ItemOutcome::failed(job_id, format!("{:#}", e)),
        };

        if let Err(e) = self.store.save(&item).await {
            warn!("Job {}: could not persist state: {:#}", job_id, e);
            return ItemOutcome::failed(job_id, format!("Failed to save state: {:#}", e));
        }
        outcome
    }
}
