// src/pipeline/generator.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::item::GeneratedResponses;
use crate::core::config_manager::require;
use crate::core::{ConfigManager, ServiceClient};
use crate::matching::CandidateProfile;
use crate::talent::JobDetails;

const SERVICE: &str = "completion";
const DEFAULT_TITLE: &str = "SDE - II";
const DEFAULT_DEPARTMENT: &str = "Amazon";
const DEFAULT_RATING: &str = "MEETS_HIGH_BAR";

/// Lead-ins the model sometimes puts before the text we asked for.
const META_PREFIXES: &[&str] = &[
    "Here is a summary of the candidate's Forte context for the hiring manager:",
    "Here is a summary of the candidate's Forte and recent work:",
    "Here is a summary:",
    "Summary:",
    "Context:",
];

/// Produces the three free-text answers of an informational request.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, job_id: &str, details: &JobDetails) -> Result<GeneratedResponses>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    context: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: String,
}

/// Chat-completion backed generator.
pub struct CompletionGenerator {
    service: ServiceClient,
    base_url: String,
    api_key: String,
    model: Option<String>,
    profile: CandidateProfile,
}

impl CompletionGenerator {
    pub fn new(service: ServiceClient, config: &ConfigManager, profile: CandidateProfile) -> Result<Self> {
        let completion = &config.completion;
        let base_url = require(&completion.api_url, "COMPLETION_API_URL")?
            .trim_end_matches('/')
            .to_string();
        let api_key = require(&completion.api_key, "COMPLETION_API_KEY")?.to_string();
        profile.require_summary()?;

        Ok(Self {
            service,
            base_url,
            api_key,
            model: completion.model.clone(),
            profile,
        })
    }

    pub async fn send_completion(&self, context: &str, content: &str) -> Result<String> {
        let request = ChatRequest {
            messages: vec![ChatMessage {
                context: context.to_string(),
                content: content.to_string(),
            }],
            model: self.model.clone(),
        };

        info!("Sending request to completion API: {}", context);
        let headers = vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )];

        let response: ChatResponse = self
            .service
            .post_json(SERVICE, &format!("{}/chat", self.base_url), &headers, &request)
            .await
            .with_context(|| format!("Completion request failed: {}", context))?;

        let text = response.message.trim().to_string();
        if text.is_empty() {
            anyhow::bail!("Completion API returned an empty answer for {}", context);
        }
        Ok(text)
    }

    async fn answer(&self, job_id: &str, label: &str, prompt: String) -> Result<String> {
        match self.send_completion(label, &prompt).await {
            Ok(text) => {
                info!("Job {}: generated {} ({} words)", job_id, label, word_count(&text));
                Ok(text)
            }
            Err(e) => {
                error!("Job {}: failed to generate {}: {:#}", job_id, label, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ResponseGenerator for CompletionGenerator {
    async fn generate(&self, job_id: &str, details: &JobDetails) -> Result<GeneratedResponses> {
        let (interest_reason, qualifications, forte_context) = tokio::try_join!(
            self.answer(job_id, "interest reason", interest_prompt(details, &self.profile)),
            self.answer(job_id, "qualifications", qualifications_prompt(details, &self.profile)),
            self.answer(job_id, "review context", context_prompt(details, &self.profile)),
        )?;

        Ok(clean_responses(GeneratedResponses {
            interest_reason,
            qualifications,
            forte_context,
        }))
    }
}

fn title(details: &JobDetails) -> &str {
    details.title().unwrap_or(DEFAULT_TITLE)
}

fn or_not_specified(items: &[&str]) -> String {
    if items.is_empty() {
        "Not specified".to_string()
    } else {
        items.join("\n")
    }
}

const VOICE: &str = "Write in the first person. Be specific, formal and enthusiastic. \
Use keyboard/ASCII characters only.";

pub fn interest_prompt(details: &JobDetails, profile: &CandidateProfile) -> String {
    format!(
        "Answer the question \"Why are you interested in this role?\"\n\n\
Job Title: {}\nDepartment: {}\nJob Description: {}\n\n\
Candidate Background:\n{}\n\n\
Write one paragraph of about 240 words connecting the candidate's goals to concrete \
details of this role and where it leads in their career. {}\n\nResponse:",
        title(details),
        details.department().unwrap_or(DEFAULT_DEPARTMENT),
        details.description(),
        profile.summary,
        VOICE
    )
}

pub fn qualifications_prompt(details: &JobDetails, profile: &CandidateProfile) -> String {
    let review = &profile.review;
    format!(
        "Answer the question \"What are your relevant skills and experience?\"\n\n\
Job Title: {}\n\nBasic Qualifications:\n{}\n\nPreferred Qualifications:\n{}\n\n\
Candidate Background:\n{}\n\n\
Manager's view of the candidate's superpowers:\n{}\n\n\
Leadership strengths noted by the manager:\n{}\n\n\
Write one paragraph of about 240 words mapping the candidate's experience to the \
qualifications with concrete examples, pitched at the seniority of the role. {}\n\nResponse:",
        title(details),
        or_not_specified(&details.required_qualifications()),
        or_not_specified(&details.preferred_qualifications()),
        profile.summary,
        review.manager_superpowers,
        review.manager_leadership_principles.join(", "),
        VOICE
    )
}

pub fn context_prompt(details: &JobDetails, profile: &CandidateProfile) -> String {
    let review = &profile.review;
    format!(
        "Summarize the candidate's latest performance review and recent work for the \
hiring manager.\n\n\
Job Title: {}\n\n\
How I best contribute: {}\nWhat I'm most excited about: {}\n\
Leadership principles I am strong in: {}\n\n\
Manager's view of my superpowers: {}\n\
Leadership strengths noted by the manager: {}\n\
Leadership principles summary: {}\n\n\
Recent work:\n{}\n\n\
Performance rating: {}\n\n\
Write one paragraph strictly under 145 words covering strengths, impact, leadership \
principles and recent momentum. Write only the paragraph itself, with no lead-in such \
as \"Here is a summary\". {}\n\nContext:",
        title(details),
        review.best_contribute,
        review.most_excited,
        review.leadership_principles.join(", "),
        review.manager_superpowers,
        review.manager_leadership_principles.join(", "),
        review.lp_summary,
        profile.recent_work,
        review.performance_rating.as_deref().unwrap_or(DEFAULT_RATING),
        VOICE
    )
}

/// Drop a known lead-in such as "Summary:" from the start of `text`.
pub fn strip_meta_prefix(text: &str) -> String {
    let trimmed = text.trim();
    META_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

pub fn clean_responses(responses: GeneratedResponses) -> GeneratedResponses {
    GeneratedResponses {
        interest_reason: responses.interest_reason.trim().to_string(),
        qualifications: responses.qualifications.trim().to_string(),
        forte_context: strip_meta_prefix(&responses.forte_context),
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
