// src/matching/mod.rs
//! Job matching against the candidate profile.

pub mod profile;
pub mod record;
pub mod runner;
pub mod scorer;

pub use profile::{Accomplishment, CandidateProfile, ReviewDetails};
pub use record::{load_records, MatchAggregate, MatchCounts, MatchRecord};
pub use runner::{HierarchySource, ListingSource, MatchRunner, MatchSummary};
pub use scorer::{score, Confidence, MatchDecision, MatchWeights, Verdict};
