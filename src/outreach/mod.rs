// src/outreach/mod.rs
//! Hiring manager emails for new YES matches.

pub mod runner;
pub mod state;

pub use runner::{group_by_hiring_manager, hierarchy_addresses, match_reasons, OutreachRunner, OutreachSummary};
pub use state::SentState;
