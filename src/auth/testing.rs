// src/auth/testing.rs
//! Scripted exchange used by credential and pipeline tests

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::credential::{Credential, CredentialOrigin, Secret};
use super::error::AuthError;
use super::exchange::{Exchange, ExchangeOutcome};

pub(crate) enum Step {
    Succeed { rotate: Option<String> },
    Fail,
}

pub(crate) struct FakeExchange {
    calls: AtomicUsize,
    seen: Mutex<Vec<Option<String>>>,
    script: Mutex<VecDeque<Step>>,
    delay_ms: u64,
    ttl: Duration,
}

impl FakeExchange {
    pub(crate) fn new() -> Self {
        Self::scripted(Vec::new())
    }

    /// Steps are consumed in order; once exhausted every exchange succeeds.
    pub(crate) fn scripted(steps: Vec<Step>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            script: Mutex::new(steps.into()),
            delay_ms: 0,
            ttl: Duration::hours(1),
        }
    }

    pub(crate) fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub(crate) fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn seen_secrets(&self) -> Vec<Option<String>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Exchange for FakeExchange {
    async fn exchange(
        &self,
        name: &str,
        refresh_secret: Option<&str>,
    ) -> Result<ExchangeOutcome, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen
            .lock()
            .unwrap()
            .push(refresh_secret.map(str::to_string));
        let step = self.script.lock().unwrap().pop_front();

        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }

        match step.unwrap_or(Step::Succeed { rotate: None }) {
            Step::Succeed { rotate } => {
                let credential = Credential::new(
                    name,
                    Secret::Token(format!("token-{}", n)),
                    Utc::now() + self.ttl,
                    CredentialOrigin::Refreshed,
                );
                Ok(ExchangeOutcome::new(credential).with_rotation(rotate))
            }
            Step::Fail => Err(AuthError::ExchangeRejected {
                name: name.to_string(),
                status: 400,
                body: "NotAuthorizedException".to_string(),
            }),
        }
    }

    fn describe(&self) -> String {
        "fake exchange".to_string()
    }
}
