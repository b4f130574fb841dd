// src/matching/scorer.rs
//! Static keyword scoring of a listing against the candidate profile.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::profile::CandidateProfile;
use crate::talent::JobListing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Yes,
    No,
    /// Processing failed; retried on the next run
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Yes => "YES",
            Verdict::No => "NO",
            Verdict::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn rank(self) -> u8 {
        match self {
            Confidence::High => 2,
            Confidence::Medium => 1,
            Confidence::Low => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    /// Points for covering every required keyword
    pub required: f64,
    pub preferred: f64,
    /// Bonus when a required keyword appears in the title
    pub title: f64,
    /// Distance from the threshold for HIGH confidence
    pub high_margin: u32,
    pub medium_margin: u32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            required: 60.0,
            preferred: 25.0,
            title: 15.0,
            high_margin: 15,
            medium_margin: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub decision: Verdict,
    pub confidence: Confidence,
    pub score: u32,
    pub matched_required: Vec<String>,
    pub matched_preferred: Vec<String>,
    pub missing_required: Vec<String>,
    pub summary: String,
}

pub fn score(listing: &JobListing, profile: &CandidateProfile, weights: &MatchWeights) -> MatchDecision {
    let title = listing.title.to_lowercase();

    if let Some(excluded) = profile
        .excluded_title_keywords
        .iter()
        .find(|k| contains_term(&title, &k.to_lowercase()))
    {
        return MatchDecision {
            decision: Verdict::No,
            confidence: Confidence::High,
            score: 0,
            matched_required: Vec::new(),
            matched_preferred: Vec::new(),
            missing_required: profile.required_keywords.clone(),
            summary: format!("Title \"{}\" contains excluded keyword \"{}\".", listing.title, excluded),
        };
    }

    let text = format!(
        "{}\n{}\n{}\n{}",
        listing.title, listing.basic_qualifications, listing.preferred_qualifications, listing.description
    )
    .to_lowercase();

    let (matched_required, missing_required): (Vec<String>, Vec<String>) = profile
        .required_keywords
        .iter()
        .cloned()
        .partition(|k| contains_term(&text, &k.to_lowercase()));
    let matched_preferred: Vec<String> = profile
        .preferred_keywords
        .iter()
        .filter(|k| contains_term(&text, &k.to_lowercase()))
        .cloned()
        .collect();

    let title_hit = profile
        .required_keywords
        .iter()
        .any(|k| contains_term(&title, &k.to_lowercase()));

    let points = weights.required * ratio(matched_required.len(), profile.required_keywords.len())
        + weights.preferred * ratio(matched_preferred.len(), profile.preferred_keywords.len())
        + if title_hit { weights.title } else { 0.0 };
    let score = points.round().clamp(0.0, 100.0) as u32;

    let decision = if score >= profile.min_score { Verdict::Yes } else { Verdict::No };
    let margin = score.abs_diff(profile.min_score);
    let confidence = if margin >= weights.high_margin {
        Confidence::High
    } else if margin >= weights.medium_margin {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    let summary = summarize(listing, &matched_required, &missing_required, &matched_preferred);

    MatchDecision {
        decision,
        confidence,
        score,
        matched_required,
        matched_preferred,
        missing_required,
        summary,
    }
}

fn ratio(matched: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64
    }
}

fn summarize(listing: &JobListing, matched: &[String], missing: &[String], preferred: &[String]) -> String {
    let mut parts = Vec::new();
    if matched.is_empty() {
        parts.push(format!("{} shares none of the core skills", listing.title));
    } else {
        parts.push(format!(
            "{} calls for {} which the candidate brings",
            listing.title,
            matched.join(", ")
        ));
    }
    if !preferred.is_empty() {
        parts.push(format!("plus preferred experience in {}", preferred.join(", ")));
    }
    if !missing.is_empty() {
        parts.push(format!("gaps: {}", missing.join(", ")));
    }
    format!("{}.", parts.join("; "))
}

/// Case-folded `needle` occurs in `haystack` with no alphanumeric character
/// on either side.
fn contains_term(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }

    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}
