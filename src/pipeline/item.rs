// src/pipeline/item.rs
//! Per-job state carried across generate and submit runs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Generated,
    Submitted,
    Failed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemState::Pending => "pending",
            ItemState::Generated => "generated",
            ItemState::Submitted => "submitted",
            ItemState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generate,
    Submit,
}

/// Job ids name state files, so only ASCII letters, digits, `-` and `_`.
pub fn is_valid_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Generated answers for the informational request form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedResponses {
    pub interest_reason: String,
    pub qualifications: String,
    /// Summary of the latest performance review and recent work
    pub forte_context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineItem {
    pub job_id: String,
    pub state: ItemState,
    /// Stage of the most recent failure, when `state` is `failed`
    #[serde(default)]
    pub failed_stage: Option<Stage>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub responses: Option<GeneratedResponses>,
    #[serde(default)]
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl PipelineItem {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: ItemState::Pending,
            failed_stage: None,
            reason: String::new(),
            job_title: None,
            department: None,
            responses: None,
            attempts: 0,
            updated_at: Utc::now(),
            submitted_at: None,
        }
    }

    pub fn has_payload(&self) -> bool {
        self.responses.is_some()
    }

    pub fn is_submitted(&self) -> bool {
        self.state == ItemState::Submitted
    }

    /// Store a freshly generated payload. A forced regeneration of a
    /// submitted item replaces the payload but stays `submitted`, so only a
    /// forced submit sends it again.
    pub fn record_generated(
        &mut self,
        responses: GeneratedResponses,
        job_title: Option<String>,
        department: Option<String>,
        force: bool,
    ) -> Result<()> {
        self.check_transition(ItemState::Generated, force)?;
        if self.is_submitted() {
            self.reason = "Regenerated responses for a submitted request".to_string();
        } else {
            self.state = ItemState::Generated;
            self.reason = "Successfully generated all responses".to_string();
        }
        self.failed_stage = None;
        self.responses = Some(responses);
        self.job_title = job_title.or(self.job_title.take());
        self.department = department.or(self.department.take());
        self.touch();
        Ok(())
    }

    pub fn record_submitted(&mut self, force: bool) -> Result<()> {
        self.check_transition(ItemState::Submitted, force)?;
        self.state = ItemState::Submitted;
        self.failed_stage = None;
        self.reason = "Successfully submitted informational request".to_string();
        self.submitted_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Record a failed attempt; any existing payload is kept.
    pub fn record_failure(&mut self, stage: Stage, reason: impl Into<String>, force: bool) -> Result<()> {
        self.check_transition(ItemState::Failed, force)?;
        self.state = ItemState::Failed;
        self.failed_stage = Some(stage);
        self.reason = reason.into();
        self.touch();
        Ok(())
    }

    /// Whether moving to `to` is allowed from the current state.
    pub fn can_transition(&self, to: ItemState, force: bool) -> bool {
        use ItemState::*;
        match (self.state, to) {
            (_, Pending) => false,
            (Submitted, _) => force,
            (Pending, Generated) | (Pending, Failed) => true,
            (Generated, Generated) | (Generated, Submitted) | (Generated, Failed) => true,
            (Failed, Generated) | (Failed, Failed) => true,
            (Failed, Submitted) => self.has_payload(),
            (Pending, Submitted) => false,
        }
    }

    fn check_transition(&self, to: ItemState, force: bool) -> Result<()> {
        if !self.can_transition(to, force) {
            anyhow::bail!(
                "Job {}: illegal transition {} -> {}{}",
                self.job_id,
                self.state,
                to,
                if self.state == ItemState::Submitted { " (requires force)" } else { "" }
            );
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
        self.updated_at = Utc::now();
    }
}
