// src/matching/runner.rs
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::profile::CandidateProfile;
use super::record::{save_record, MatchAggregate, MatchCounts, MatchRecord};
use super::scorer::{score, MatchWeights, Verdict};
use crate::core::ConfigManager;
use crate::pipeline::ConcurrencyLimiter;
use crate::talent::{EmployeeClient, HierarchyEntry, JobListing, JobsClient};

const MATCH_CONCURRENCY: usize = 10;

#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn listings(&self) -> Result<Vec<JobListing>>;
}

#[async_trait]
impl ListingSource for JobsClient {
    async fn listings(&self) -> Result<Vec<JobListing>> {
        self.search().await
    }
}

#[async_trait]
pub trait HierarchySource: Send + Sync {
    async fn hierarchy(&self, login: &str, target_level: u32) -> Result<Vec<HierarchyEntry>>;
}

#[async_trait]
impl HierarchySource for EmployeeClient {
    async fn hierarchy(&self, login: &str, target_level: u32) -> Result<Vec<HierarchyEntry>> {
        EmployeeClient::hierarchy(self, login, target_level).await
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchSummary {
    pub fetched: usize,
    pub skipped: usize,
    pub processed: usize,
    pub yes: usize,
    pub errors: usize,
    pub counts: MatchCounts,
}

pub struct MatchRunner {
    listings: Arc<dyn ListingSource>,
    hierarchy: Arc<dyn HierarchySource>,
    profile: CandidateProfile,
    weights: MatchWeights,
    per_job_dir: PathBuf,
    results_path: PathBuf,
    target_level: u32,
}

impl MatchRunner {
    pub fn new(
        listings: Arc<dyn ListingSource>,
        hierarchy: Arc<dyn HierarchySource>,
        profile: CandidateProfile,
        config: &ConfigManager,
    ) -> Self {
        let environment = &config.environment;
        Self {
            listings,
            hierarchy,
            profile,
            weights: MatchWeights::default(),
            per_job_dir: environment.per_job_dir(),
            results_path: environment.match_results_path(),
            target_level: environment.limits.hierarchy_target_level,
        }
    }

    pub fn with_weights(mut self, weights: MatchWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Score every listing not decided on a previous run, write one record
    /// per job, then refresh the aggregated results file.
    pub async fn run(&self, limit: Option<usize>) -> Result<MatchSummary> {
        let recovered = MatchAggregate::rebuild(&self.results_path, &self.per_job_dir).await?;
        let processed_ids = recovered.processed_ids();
        info!(
            "Recovered {} processed jobs from {}",
            processed_ids.len(),
            self.per_job_dir.display()
        );

        let listings = self.listings.listings().await?;
        let fetched = listings.len();

        let mut pending: Vec<JobListing> = listings
            .into_iter()
            .filter(|l| {
                let id = l.job_id.trim();
                !id.is_empty() && !processed_ids.contains(id)
            })
            .collect();
        let skipped = fetched - pending.len();
        info!(
            "Skipping {} already processed jobs. Remaining to process: {} (from {})",
            skipped,
            pending.len(),
            fetched
        );
        if let Some(limit) = limit {
            pending.truncate(limit);
        }

        let limiter = ConcurrencyLimiter::new(MATCH_CONCURRENCY)?;
        let results = join_all(pending.iter().map(|listing| {
            let limiter = limiter.clone();
            async move { limiter.run(self.process(listing)).await }
        }))
        .await;

        let mut summary = MatchSummary {
            fetched,
            skipped,
            ..MatchSummary::default()
        };
        for result in results {
            let record = result??;
            summary.processed += 1;
            match record.decision {
                Verdict::Yes => summary.yes += 1,
                Verdict::Error => summary.errors += 1,
                Verdict::No => {}
            }
        }

        let aggregate = MatchAggregate::rebuild(&self.results_path, &self.per_job_dir).await?;
        info!(
            "Final aggregated results written to {}: {:?}",
            self.results_path.display(),
            aggregate.counts
        );
        summary.counts = aggregate.counts;
        Ok(summary)
    }

    /// Decide one listing and persist the record; failures become `ERROR`
    /// records. Only a failed write is returned as an error.
    async fn process(&self, listing: &JobListing) -> Result<MatchRecord> {
        let decision = score(listing, &self.profile, &self.weights);
        app_log!(
            debug,
            "job_id={} decision={} score={}",
            listing.job_id,
            decision.decision,
            decision.score
        );

        let record = if decision.decision == Verdict::Yes {
            match self.manager_chain(listing).await {
                Ok(hierarchy) => MatchRecord::decided(listing, &decision, hierarchy),
                Err(e) => {
                    warn!("Job failed job_id={} title={}: {:#}", listing.job_id, listing.title, e);
                    MatchRecord::failed(listing, "employee_hierarchy", &e)
                }
            }
        } else {
            MatchRecord::decided(listing, &decision, None)
        };

        save_record(&self.per_job_dir, &record).await?;
        Ok(record)
    }

    async fn manager_chain(&self, listing: &JobListing) -> Result<Option<Vec<HierarchyEntry>>> {
        match listing.first_hiring_manager() {
            Some(login) => Ok(Some(self.hierarchy.hierarchy(login, self.target_level).await?)),
            None => Ok(None),
        }
    }
}
