// src/matching/profile.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::core::ConfigManager;

/// A link shown on the informational request form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accomplishment {
    pub title: String,
    pub link: String,
}

/// Latest performance review, as written by the candidate and their manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewDetails {
    pub best_contribute: String,
    pub most_excited: String,
    pub leadership_principles: Vec<String>,
    pub lp_summary: String,
    pub manager_superpowers: String,
    pub manager_leadership_principles: Vec<String>,
    pub performance_rating: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    pub summary: String,
    pub required_keywords: Vec<String>,
    pub preferred_keywords: Vec<String>,
    /// Titles containing any of these are never a match
    pub excluded_title_keywords: Vec<String>,
    pub min_score: u32,
    pub recent_work: String,
    pub accomplishments: Vec<Accomplishment>,
    pub review: ReviewDetails,
}

impl Default for CandidateProfile {
    fn default() -> Self {
        Self {
            summary: String::new(),
            required_keywords: Vec::new(),
            preferred_keywords: Vec::new(),
            excluded_title_keywords: Vec::new(),
            min_score: 60,
            recent_work: String::new(),
            accomplishments: Vec::new(),
            review: ReviewDetails::default(),
        }
    }
}

impl CandidateProfile {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse candidate profile")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read candidate profile: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid candidate profile: {}", path.display()))
    }

    /// Profile at the configured path (defaults when the file is absent);
    /// `CANDIDATE_SUMMARY` fills an empty summary.
    pub async fn from_config(config: &ConfigManager) -> Result<Self> {
        let path = &config.environment.profile_path;
        let mut profile = if tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!("Loading candidate profile from {}", path.display());
            Self::load(path).await?
        } else {
            info!("No candidate profile at {}, using defaults", path.display());
            Self::default()
        };

        if profile.summary.trim().is_empty() {
            if let Some(summary) = &config.candidate_summary {
                profile.summary = summary.trim().to_string();
            }
        }
        Ok(profile)
    }

    /// Fails when there is nothing to describe the candidate with.
    pub fn require_summary(&self) -> Result<&str> {
        let summary = self.summary.trim();
        if summary.is_empty() {
            anyhow::bail!("Candidate summary is missing: set `summary` in the profile or CANDIDATE_SUMMARY");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentConfig;

    const PROFILE: &str = r#"
summary = "Backend engineer, 5 years of distributed systems."
required_keywords = ["java", "distributed systems"]
preferred_keywords = ["rust"]
excluded_title_keywords = ["manager"]
min_score = 55
recent_work = "Migrated the ledger to DynamoDB."

[[accomplishments]]
title = "Ledger migration"
link = "https://example.com/ledger"

[review]
best_contribute = "Driving ambiguous projects"
leadership_principles = ["Ownership", "Dive Deep"]
performance_rating = "MEETS_HIGH_BAR"
"#;

    #[test]
    fn test_parse_profile() {
        let profile = CandidateProfile::from_toml(PROFILE).unwrap();
        assert_eq!(profile.min_score, 55);
        assert_eq!(profile.required_keywords.len(), 2);
        assert_eq!(profile.accomplishments[0].title, "Ledger migration");
        assert_eq!(profile.review.leadership_principles, vec!["Ownership", "Dive Deep"]);
        assert_eq!(profile.review.most_excited, "");
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let profile = CandidateProfile::from_toml("summary = \"x\"").unwrap();
        assert_eq!(profile.min_score, 60);
        assert!(profile.accomplishments.is_empty());
    }

    #[tokio::test]
    async fn test_from_config_falls_back_to_env_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut environment = EnvironmentConfig::default();
        environment.profile_path = dir.path().join("missing.toml");
        let config = ConfigManager::from_lookup(environment, |key| {
            (key == "CANDIDATE_SUMMARY").then(|| "Env summary".to_string())
        })
        .unwrap();

        let profile = CandidateProfile::from_config(&config).await.unwrap();
        assert_eq!(profile.require_summary().unwrap(), "Env summary");
    }

    #[test]
    fn test_require_summary() {
        assert!(CandidateProfile::default().require_summary().is_err());
    }
}
