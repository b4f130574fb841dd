// src/outreach/runner.rs
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::state::SentState;
use crate::core::config_manager::require;
use crate::core::ConfigManager;
use crate::mail::{Envelope, MailSender};
use crate::matching::{load_records, MatchRecord};
use crate::talent::HierarchyEntry;

const NO_SUMMARY: &str = "No summary available";

/// What one outreach run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutreachSummary {
    pub dry_run: bool,
    pub total_managers: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub sent_job_ids: Vec<String>,
    pub errors: Vec<String>,
}

impl OutreachSummary {
    pub fn has_failures(&self) -> bool {
        self.emails_failed > 0
    }
}

/// Emails each hiring manager once about every new YES match they own.
pub struct OutreachRunner {
    mailer: Arc<dyn MailSender>,
    per_job_dir: PathBuf,
    state_path: PathBuf,
    subject: String,
    body_template: String,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    notify_hierarchy: bool,
    hierarchy_domain: String,
}

impl OutreachRunner {
    pub fn new(mailer: Arc<dyn MailSender>, config: &ConfigManager) -> Result<Self> {
        let mail = &config.mail;
        Ok(Self {
            mailer,
            per_job_dir: config.environment.per_job_dir(),
            state_path: config.environment.sent_emails_state_path(),
            subject: require(&mail.subject, "SUBJECT")?.to_string(),
            body_template: require(&mail.body_template, "BODY")?.to_string(),
            to: mail.to.clone(),
            cc: mail.cc.clone(),
            bcc: mail.bcc.clone(),
            notify_hierarchy: mail.notify_hierarchy,
            hierarchy_domain: mail.hierarchy_domain.clone(),
        })
    }

    pub async fn run(&self, dry_run: bool, force_resend_all: bool) -> Result<OutreachSummary> {
        if !self.per_job_dir.exists() {
            anyhow::bail!("per_job folder not found: {}", self.per_job_dir.display());
        }

        let mut state = SentState::load(&self.state_path).await?;
        let known = if force_resend_all {
            warn!("Force resend enabled, ignoring state file");
            SentState::default()
        } else {
            state.clone()
        };

        let records = load_records(&self.per_job_dir).await?;
        let total = records.len();
        let pending: Vec<MatchRecord> = records
            .into_iter()
            .filter(|r| r.is_yes() && !known.contains(&r.job_id))
            .collect();
        info!("Scanned {} job files: {} new YES decisions to send", total, pending.len());

        let groups = group_by_hiring_manager(pending);
        let mut summary = OutreachSummary {
            dry_run,
            total_managers: groups.len(),
            ..OutreachSummary::default()
        };

        for (manager, jobs) in &groups {
            info!("Hiring manager {}: {} matched job(s)", manager, jobs.len());
            let envelope = match self.prepare(manager, jobs) {
                Ok(envelope) => envelope,
                Err(e) => {
                    error!("Failed to prepare email for {}: {:#}", manager, e);
                    summary.emails_failed += 1;
                    summary.errors.push(format!("{}: {:#}", manager, e));
                    continue;
                }
            };
            info!("TO: {:?} CC: {:?} BCC: {:?}", envelope.to, envelope.cc, envelope.bcc);

            if dry_run {
                info!("DRY RUN subject: {}\n{}", envelope.subject, envelope.body_html);
            } else if let Err(e) = self.mailer.send(&envelope).await {
                error!("Failed to send email to {}: {:#}", manager, e);
                summary.emails_failed += 1;
                summary.errors.push(format!("{}: {:#}", manager, e));
                continue;
            } else {
                info!("Email sent to {}", manager);
            }

            summary.emails_sent += 1;
            summary
                .sent_job_ids
                .extend(jobs.iter().map(|job| job.job_id.clone()));
        }

        if dry_run {
            info!("DRY RUN: state file not updated");
        } else if !summary.sent_job_ids.is_empty() {
            state.merge(summary.sent_job_ids.iter().cloned());
            state.save(&self.state_path).await?;
        }

        info!(
            "Outreach finished: {} sent, {} failed across {} manager(s)",
            summary.emails_sent, summary.emails_failed, summary.total_managers
        );
        Ok(summary)
    }

    fn prepare(&self, manager: &str, jobs: &[MatchRecord]) -> Result<Envelope> {
        let hierarchy = jobs
            .first()
            .and_then(|job| job.employee_hierarchy.as_deref())
            .unwrap_or_default();
        let first_name = hierarchy
            .first()
            .and_then(|entry| entry.first_name.as_deref())
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("No employee hierarchy for hiring manager {}", manager))?;

        let body_html = self
            .body_template
            .replace("{{manager_first_name}}", first_name)
            .replace("{{match_reasons}}", &match_reasons(jobs));

        let (mut to, mut cc) = if self.notify_hierarchy {
            hierarchy_addresses(hierarchy, &self.hierarchy_domain)
        } else {
            (Vec::new(), Vec::new())
        };
        to.extend(self.to.iter().cloned());
        cc.extend(self.cc.iter().cloned());

        Ok(Envelope {
            to,
            cc,
            bcc: self.bcc.clone(),
            subject: self.subject.clone(),
            body_html,
        })
    }
}

/// Jobs keyed by their first hiring manager; jobs without one are dropped.
pub fn group_by_hiring_manager(jobs: Vec<MatchRecord>) -> BTreeMap<String, Vec<MatchRecord>> {
    let mut groups: BTreeMap<String, Vec<MatchRecord>> = BTreeMap::new();
    for job in jobs {
        match job.hiring_manager_usernames.first().cloned() {
            Some(manager) => groups.entry(manager).or_default().push(job),
            None => warn!("Job {} has no hiring managers, skipping", job.job_id),
        }
    }
    groups
}

/// Ordered HTML list with one line per job.
pub fn match_reasons(jobs: &[MatchRecord]) -> String {
    let items: Vec<String> = jobs
        .iter()
        .map(|job| {
            format!(
                "  <li><strong>Job ID {}</strong> ({}) - {}</li>",
                job.job_id,
                job.title,
                job.summary_50w.as_deref().unwrap_or(NO_SUMMARY)
            )
        })
        .collect();
    format!("<ol>\n{}\n</ol>", items.join("\n"))
}

/// The hiring manager as recipient and the rest of the chain on copy.
pub fn hierarchy_addresses(hierarchy: &[HierarchyEntry], domain: &str) -> (Vec<String>, Vec<String>) {
    let mut addresses = hierarchy
        .iter()
        .filter_map(|entry| entry.alias.as_deref())
        .filter(|alias| !alias.trim().is_empty())
        .map(|alias| format!("{}@{}", alias.trim(), domain));
    let to = addresses.next().into_iter().collect();
    (to, addresses.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentConfig;
    use crate::matching::record::save_record;
    use crate::matching::Verdict;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMailer {
        sent: Mutex<Vec<Envelope>>,
        failing_for: HashSet<String>,
    }

    #[async_trait]
    impl MailSender for FakeMailer {
        async fn send(&self, envelope: &Envelope) -> Result<()> {
            if envelope.to.iter().any(|a| self.failing_for.contains(a)) {
                anyhow::bail!("CreateItem failed with status 500");
            }
            self.sent.lock().unwrap().push(envelope.clone());
            Ok(())
        }
    }

    fn entry(alias: &str, first: &str) -> HierarchyEntry {
        HierarchyEntry {
            alias: Some(alias.into()),
            first_name: Some(first.into()),
            last_name: None,
            job_level: None,
        }
    }

    fn record(job_id: &str, manager: &str, decision: Verdict, chain: Option<Vec<HierarchyEntry>>) -> MatchRecord {
        MatchRecord {
            timestamp: Utc::now(),
            job_id: job_id.into(),
            title: format!("Role {}", job_id),
            hiring_manager_usernames: vec![manager.into()],
            hiring_manager_names: Vec::new(),
            recruiter_usernames: Vec::new(),
            employee_hierarchy: chain,
            decision,
            confidence: None,
            score: Some(80),
            summary_50w: Some(format!("fit {}", job_id)),
            matched_keywords: Vec::new(),
            error: None,
        }
    }

    async fn seed(per_job: &Path) {
        let chain = || Some(vec![entry("alice", "Alice"), entry("bob", "Bob")]);
        save_record(per_job, &record("1", "alice", Verdict::Yes, chain())).await.unwrap();
        save_record(per_job, &record("2", "alice", Verdict::Yes, chain())).await.unwrap();
        save_record(per_job, &record("3", "carol", Verdict::Yes, Some(vec![entry("carol", "Carol")])))
            .await
            .unwrap();
        save_record(per_job, &record("4", "dave", Verdict::No, None)).await.unwrap();
    }

    fn runner(dir: &Path, mailer: Arc<FakeMailer>, notify_hierarchy: bool) -> OutreachRunner {
        let mut environment = EnvironmentConfig::default();
        environment.results_path = dir.to_path_buf();
        let config = ConfigManager::from_lookup(environment, |key| match key {
            "SUBJECT" => Some("Transfer interest".into()),
            "BODY" => Some("<p>Hi {{manager_first_name}},</p>{{match_reasons}}".into()),
            "BCC_ADDRS" => Some("me@example.com".into()),
            "NOTIFY_HIERARCHY" if notify_hierarchy => Some("true".into()),
            "HIERARCHY_EMAIL_DOMAIN" => Some("@corp.example".into()),
            _ => None,
        })
        .unwrap();
        OutreachRunner::new(mailer, &config).unwrap()
    }

    #[test]
    fn test_match_reasons_and_addresses() {
        let jobs = vec![record("7", "x", Verdict::Yes, None)];
        assert_eq!(
            match_reasons(&jobs),
            "<ol>\n  <li><strong>Job ID 7</strong> (Role 7) - fit 7</li>\n</ol>"
        );

        let (to, cc) = hierarchy_addresses(&[entry("a", "A"), entry("b", "B"), entry("c", "C")], "corp.example");
        assert_eq!(to, vec!["a@corp.example"]);
        assert_eq!(cc, vec!["b@corp.example", "c@corp.example"]);
    }

    #[tokio::test]
    async fn test_groups_by_manager_and_records_state() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(FakeMailer::default());
        let runner = runner(dir.path(), mailer.clone(), true);
        seed(&runner.per_job_dir).await;

        let summary = runner.run(false, false).await.unwrap();
        assert_eq!(summary.total_managers, 2);
        assert_eq!(summary.emails_sent, 2);
        assert!(!summary.has_failures());

        let sent = mailer.sent.lock().unwrap().clone();
        let alice = sent.iter().find(|e| e.to == vec!["alice@corp.example"]).unwrap();
        assert_eq!(alice.cc, vec!["bob@corp.example"]);
        assert_eq!(alice.bcc, vec!["me@example.com"]);
        assert!(alice.body_html.starts_with("<p>Hi Alice,</p><ol>"));
        assert!(alice.body_html.contains("Job ID 1"));
        assert!(alice.body_html.contains("Job ID 2"));

        let state = SentState::load(&runner.state_path).await.unwrap();
        assert_eq!(state.total_sent, 3);

        let again = runner.run(false, false).await.unwrap();
        assert_eq!(again.total_managers, 0);
        assert_eq!(mailer.sent.lock().unwrap().len(), 2);

        let forced = runner.run(false, true).await.unwrap();
        assert_eq!(forced.emails_sent, 2);
    }

    #[tokio::test]
    async fn test_hierarchy_not_addressed_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(FakeMailer::default());
        let runner = runner(dir.path(), mailer.clone(), false);
        seed(&runner.per_job_dir).await;

        runner.run(false, false).await.unwrap();
        let sent = mailer.sent.lock().unwrap().clone();
        assert!(sent.iter().all(|e| e.to.is_empty() && e.cc.is_empty()));
        assert!(sent.iter().all(|e| e.bcc == vec!["me@example.com"]));
    }

    #[tokio::test]
    async fn test_unreadable_state_aborts_without_sending() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(FakeMailer::default());
        let runner = runner(dir.path(), mailer.clone(), true);
        seed(&runner.per_job_dir).await;
        tokio::fs::write(&runner.state_path, r#"{"sent_jobs": "1,2"}"#).await.unwrap();

        assert!(runner.run(false, false).await.is_err());
        assert!(mailer.sent.lock().unwrap().is_empty());
        let raw = tokio::fs::read_to_string(&runner.state_path).await.unwrap();
        assert_eq!(raw, r#"{"sent_jobs": "1,2"}"#);
    }

    #[tokio::test]
    async fn test_naive_timestamp_state_skips_sent_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(FakeMailer::default());
        let runner = runner(dir.path(), mailer.clone(), true);
        seed(&runner.per_job_dir).await;
        tokio::fs::write(
            &runner.state_path,
            r#"{"sent_jobs":["1","2"],"last_run":"2025-10-01T12:34:56.123456","total_sent":2}"#,
        )
        .await
        .unwrap();

        let summary = runner.run(false, false).await.unwrap();
        assert_eq!(summary.total_managers, 1);
        assert_eq!(summary.sent_job_ids, vec!["3"]);

        let state = SentState::load(&runner.state_path).await.unwrap();
        assert_eq!(state.sent_jobs.len(), 3);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_state_alone() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(FakeMailer::default());
        let runner = runner(dir.path(), mailer.clone(), true);
        seed(&runner.per_job_dir).await;

        let summary = runner.run(true, false).await.unwrap();
        assert_eq!(summary.sent_job_ids.len(), 3);
        assert!(mailer.sent.lock().unwrap().is_empty());
        assert!(!runner.state_path.exists());
    }

    #[tokio::test]
    async fn test_failures_are_reported_and_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(FakeMailer {
            failing_for: ["carol@corp.example".to_string()].into_iter().collect(),
            ..FakeMailer::default()
        });
        let runner = runner(dir.path(), mailer.clone(), true);
        seed(&runner.per_job_dir).await;
        save_record(&runner.per_job_dir, &record("5", "erin", Verdict::Yes, None))
            .await
            .unwrap();

        let summary = runner.run(false, false).await.unwrap();
        assert_eq!(summary.emails_sent, 1);
        assert_eq!(summary.emails_failed, 2);
        assert!(summary.errors.iter().any(|e| e.contains("No employee hierarchy")));

        let state = SentState::load(&runner.state_path).await.unwrap();
        assert_eq!(state.sent_jobs.len(), 2);
        assert!(!state.contains("3"));
    }

    #[tokio::test]
    async fn test_missing_per_job_folder() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(dir.path(), Arc::new(FakeMailer::default()), false);
        assert!(runner.run(false, false).await.is_err());
    }
}
