// src/pipeline/mod.rs
//! Two-stage informational request pipeline: generate, then submit.

pub mod discovery;
pub mod generate;
pub mod generator;
pub mod item;
pub mod limiter;
pub mod outcome;
pub mod report;
pub mod store;
pub mod submit;

#[cfg(test)]
pub(crate) mod testing;

pub use generate::GenerateStage;
pub use generator::{CompletionGenerator, ResponseGenerator};
pub use item::{is_valid_job_id, GeneratedResponses, ItemState, PipelineItem, Stage};
pub use limiter::ConcurrencyLimiter;
pub use outcome::{dedup_ids, ItemOutcome, OutcomeStatus};
pub use report::SubmissionReport;
pub use store::ItemStore;
pub use submit::{SubmitStage, Submitter};
