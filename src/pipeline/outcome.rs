// src/pipeline/outcome.rs
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Generated,
    Submitted,
    /// Nothing to do without force
    Skipped,
    /// Would have been submitted
    DryRun,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Generated => "generated",
            OutcomeStatus::Submitted => "submitted",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::DryRun => "dry-run",
            OutcomeStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Terminal result of one input item in a stage run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub job_id: String,
    pub status: OutcomeStatus,
    pub reason: String,
}

impl ItemOutcome {
    pub fn new(job_id: impl Into<String>, status: OutcomeStatus, reason: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            reason: reason.into(),
        }
    }

    pub fn failed(job_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(job_id, OutcomeStatus::Failed, reason)
    }

    pub fn is_failure(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

/// Counts per status, for the end-of-run log line.
pub fn tally(outcomes: &[ItemOutcome]) -> String {
    let count = |status| outcomes.iter().filter(|o| o.status == status).count();
    format!(
        "{} generated, {} submitted, {} skipped, {} dry-run, {} failed",
        count(OutcomeStatus::Generated),
        count(OutcomeStatus::Submitted),
        count(OutcomeStatus::Skipped),
        count(OutcomeStatus::DryRun),
        count(OutcomeStatus::Failed)
    )
}

/// Input ids trimmed, blanks dropped, first occurrence kept.
pub fn dedup_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .map(|id| id.as_ref().trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}
