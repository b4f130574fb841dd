// src/cli.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::CredentialManager;
use crate::core::{ConfigManager, ServiceClient};
use crate::mail::OwaMailer;
use crate::matching::{CandidateProfile, MatchRunner};
use crate::outreach::OutreachRunner;
use crate::pipeline::discovery::{ids_from_sent_file, ids_with_payload, keep_yes_decisions, yes_ids_without_payload};
use crate::pipeline::{
    CompletionGenerator, ConcurrencyLimiter, GenerateStage, ItemOutcome, ItemStore, SubmitStage,
};
use crate::talent::{export_csv, EmployeeClient, JobDetailsClient, JobDetailsSource, JobsClient, SelfIntroSubmitter};

#[derive(Parser)]
#[command(name = "transfer-automator")]
#[command(about = "Internal transfer job search: match, notify, request")]
pub struct Cli {
    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect or refresh credentials
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// List open jobs from the search API
    Jobs {
        /// Also write the listings to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print the details document of one job
    JobDetails { job_id: String },
    /// Look up an employee, or their management chain
    Employee {
        login: String,
        /// Walk up the chain until this job level
        #[arg(long)]
        target_level: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Score new listings against the candidate profile
    Match {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Email hiring managers about new YES matches
    Email {
        #[arg(long)]
        dry_run: bool,
        /// Ignore the sent-emails state
        #[arg(long)]
        force_resend_all: bool,
    },
    /// Generate informational request answers
    Generate {
        ids: Vec<String>,
        /// Read job ids from a {"sent_jobs": [...]} file
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    /// Submit generated informational requests
    Submit {
        ids: Vec<String>,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Show every credential and its expiry
    Status,
    /// Force an exchange for a refreshable credential
    Refresh { name: String },
}

/// Shared clients built once per invocation.
struct App {
    config: ConfigManager,
    service: ServiceClient,
    credentials: Arc<CredentialManager>,
}

impl App {
    async fn new() -> Result<Self> {
        let config = ConfigManager::load()?;
        config.environment.ensure_directories().await?;
        let service = ServiceClient::new(config.environment.limits.request_timeout_secs)?;
        let credentials = Arc::new(CredentialManager::from_config(&config, service.http().clone()));
        Ok(Self {
            config,
            service,
            credentials,
        })
    }

    fn jobs(&self) -> JobsClient {
        JobsClient::new(self.service.clone(), self.credentials.clone(), &self.config)
    }

    fn employees(&self) -> EmployeeClient {
        EmployeeClient::new(self.service.clone(), self.credentials.clone(), &self.config)
    }

    fn store(&self) -> ItemStore {
        ItemStore::new(self.config.environment.request_state_dir())
    }
}

/// Run one command; `Ok(false)` when some item failed.
pub async fn run(cli: Cli) -> Result<bool> {
    let app = App::new().await?;

    match cli.command {
        Command::Auth { command } => auth(&app, command).await,
        Command::Jobs { csv } => {
            let listings = app.jobs().search().await?;
            for listing in &listings {
                println!("{:<10} {}", listing.job_id, listing.title);
            }
            println!("{} job(s)", listings.len());
            if let Some(path) = csv {
                export_csv(&listings, &path)?;
                println!("Wrote {}", path.display());
            }
            Ok(true)
        }
        Command::JobDetails { job_id } => {
            let client = JobDetailsClient::new(app.service.clone(), app.credentials.clone(), &app.config);
            let details = client.details(&job_id).await?;
            println!("{}", serde_json::to_string_pretty(&details)?);
            Ok(true)
        }
        Command::Employee {
            login,
            target_level,
            json,
        } => employee(&app, &login, target_level, json).await,
        Command::Match { limit } => {
            let profile = CandidateProfile::from_config(&app.config).await?;
            let runner = MatchRunner::new(
                Arc::new(app.jobs()),
                Arc::new(app.employees()),
                profile,
                &app.config,
            );
            let summary = runner.run(limit).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(summary.errors == 0)
        }
        Command::Email {
            dry_run,
            force_resend_all,
        } => {
            let mailer = OwaMailer::new(app.service.clone(), app.credentials.clone(), &app.config);
            let runner = OutreachRunner::new(Arc::new(mailer), &app.config)?;
            let summary = runner.run(dry_run, force_resend_all).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(!summary.has_failures())
        }
        Command::Generate { ids, file, force } => generate(&app, ids, file, force).await,
        Command::Submit { ids, force, dry_run } => submit(&app, ids, force, dry_run).await,
    }
}

async fn auth(app: &App, command: AuthCommand) -> Result<bool> {
    match command {
        AuthCommand::Status => {
            println!(
                "{:<20} {:<12} {:<10} {:<26} {:<8} {}",
                "NAME", "KIND", "ORIGIN", "EXPIRES", "EXPIRED", "SOURCE"
            );
            println!("{}", "-".repeat(100));
            let mut rows = app.credentials.status().await;
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            for row in rows {
                println!(
                    "{:<20} {:<12} {:<10} {:<26} {:<8} {}",
                    row.name,
                    row.kind,
                    row.origin.map(|o| format!("{:?}", o)).unwrap_or_else(|| "-".into()),
                    row.expires_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()),
                    row.expired,
                    row.source
                );
            }
            Ok(true)
        }
        AuthCommand::Refresh { name } => {
            let credential = app.credentials.refresh(&name).await?;
            println!("{} refreshed, expires at {}", name, credential.expires_at.to_rfc3339());
            Ok(true)
        }
    }
}

async fn employee(app: &App, login: &str, target_level: Option<u32>, json: bool) -> Result<bool> {
    let client = app.employees();
    match target_level {
        Some(level) => {
            let chain = client.hierarchy(login, level).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&chain)?);
            } else {
                for entry in &chain {
                    println!(
                        "{:<12} {} {} (L{})",
                        entry.alias.as_deref().unwrap_or("-"),
                        entry.first_name.as_deref().unwrap_or(""),
                        entry.last_name.as_deref().unwrap_or(""),
                        entry.job_level.as_deref().unwrap_or("?")
                    );
                }
            }
        }
        None => {
            let details = client.details(login).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                println!(
                    "{} {} ({}), level {}, manager {}",
                    details.first_name.as_deref().unwrap_or(""),
                    details.last_name.as_deref().unwrap_or(""),
                    login,
                    details.level(),
                    details.manager_login().unwrap_or("-")
                );
            }
        }
    }
    Ok(true)
}

async fn generate(app: &App, ids: Vec<String>, file: Option<PathBuf>, force: bool) -> Result<bool> {
    let store = app.store();
    let per_job_dir = app.config.environment.per_job_dir();
    let job_ids = match (ids.is_empty(), file) {
        (false, _) => ids,
        (true, Some(path)) => keep_yes_decisions(ids_from_sent_file(&path).await?, &per_job_dir).await,
        (true, None) => yes_ids_without_payload(&per_job_dir, &store).await?,
    };
    if job_ids.is_empty() {
        app_log!(info, "No jobs need responses generated");
        return Ok(true);
    }

    let profile = CandidateProfile::from_config(&app.config).await?;
    let details: Arc<dyn JobDetailsSource> = Arc::new(JobDetailsClient::new(
        app.service.clone(),
        app.credentials.clone(),
        &app.config,
    ));
    let generator = CompletionGenerator::new(app.service.clone(), &app.config, profile)?;
    let limiter = ConcurrencyLimiter::new(app.config.environment.limits.generate_concurrency)
        .context("Invalid generate concurrency")?;

    let stage = GenerateStage::new(store, details, Arc::new(generator), limiter);
    let outcomes = stage.run(&job_ids, force).await?;
    Ok(print_outcomes(&outcomes))
}

async fn submit(app: &App, ids: Vec<String>, force: bool, dry_run: bool) -> Result<bool> {
    let store = app.store();
    let job_ids = if ids.is_empty() {
        ids_with_payload(&store).await?
    } else {
        ids
    };
    if job_ids.is_empty() {
        app_log!(info, "No generated payloads to submit");
        return Ok(true);
    }

    let profile = CandidateProfile::from_config(&app.config).await?;
    let submitter = SelfIntroSubmitter::new(
        app.service.clone(),
        app.credentials.clone(),
        &app.config,
        profile.accomplishments,
    )?;
    let limiter = ConcurrencyLimiter::new(app.config.environment.limits.submit_concurrency)
        .context("Invalid submit concurrency")?;

    let stage = SubmitStage::new(
        store,
        Arc::new(submitter),
        limiter,
        app.config.environment.request_results_path(),
    );
    let outcomes = stage.run(&job_ids, force, dry_run).await?;
    Ok(print_outcomes(&outcomes))
}

/// One line per item; true when nothing failed.
fn print_outcomes(outcomes: &[ItemOutcome]) -> bool {
    for outcome in outcomes {
        println!("{:<10} {:<10} {}", outcome.job_id, outcome.status, outcome.reason);
    }
    !outcomes.iter().any(ItemOutcome::is_failure)
}
