// src/auth/refreshable.rs
//! A credential slot that renews itself through an [`Exchange`].
//!
//! The slot lock is held across the exchange, so concurrent callers queue
//! behind the caller doing the network round trip and then observe its
//! outcome instead of starting their own.

use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::credential::Credential;
use super::error::AuthError;
use super::exchange::Exchange;

pub const DEFAULT_REFRESH_SKEW_SECS: i64 = 300;

struct Slot {
    current: Option<Credential>,
    refresh_secret: Option<String>,
    last_failure: Option<AuthError>,
}

pub struct RefreshableCredential {
    name: String,
    exchange: Arc<dyn Exchange>,
    skew: Duration,
    slot: Mutex<Slot>,
    /// Completed exchange attempts, successful or not
    attempts: AtomicU64,
}

impl RefreshableCredential {
    pub fn new(
        name: impl Into<String>,
        exchange: Arc<dyn Exchange>,
        refresh_secret: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            exchange,
            skew: Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
            slot: Mutex::new(Slot {
                current: None,
                refresh_secret,
                last_failure: None,
            }),
            attempts: AtomicU64::new(0),
        }
    }

    /// Seed the slot with a credential obtained out of band, e.g. a token
    /// copied from the browser alongside its refresh secret.
    pub fn with_initial(mut self, credential: Credential) -> Self {
        self.slot.get_mut().current = Some(credential);
        self
    }

    pub fn with_skew(mut self, skew: Duration) -> Self {
        self.skew = skew;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn describe(&self) -> String {
        self.exchange.describe()
    }

    pub fn exchange_count(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Current credential without triggering an exchange.
    pub async fn snapshot(&self) -> Option<Credential> {
        self.slot.lock().await.current.clone()
    }

    /// A credential that is not expired, exchanging first when the current
    /// one is missing or inside the refresh skew.
    pub async fn get(&self) -> Result<Credential, AuthError> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        if let Some(current) = &slot.current {
            if !current.needs_refresh_at(Utc::now(), self.skew) {
                return Ok(current.clone());
            }
        }

        // An exchange finished while we were queued and it failed: share its
        // outcome rather than hitting the provider again.
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(err) = slot.last_failure.clone() {
                return self.fall_back(&slot, err);
            }
        }

        self.refresh_locked(&mut slot, true).await
    }

    /// Renew after a remote API rejected `stale`.
    ///
    /// If another caller already replaced `stale` with a usable credential,
    /// that one is returned without a new exchange. The rejected credential
    /// is never handed back.
    pub async fn force_refresh(&self, stale: &Credential) -> Result<Credential, AuthError> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        if let Some(current) = &slot.current {
            if current.secret != stale.secret && !current.needs_refresh_at(Utc::now(), self.skew) {
                app_log!(debug, "{}: already replaced by a concurrent refresh", self.name);
                return Ok(current.clone());
            }
        }

        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(err) = slot.last_failure.clone() {
                return Err(err);
            }
        }

        app_log!(info, "{}: forcing refresh after rejection", self.name);
        self.refresh_locked(&mut slot, false).await
    }

    async fn refresh_locked(
        &self,
        slot: &mut Slot,
        allow_fallback: bool,
    ) -> Result<Credential, AuthError> {
        app_log!(info, "Refreshing credential {} via {}", self.name, self.exchange.describe());

        let result = self
            .exchange
            .exchange(&self.name, slot.refresh_secret.as_deref())
            .await
            .and_then(|outcome| {
                if outcome.credential.is_expired_at(Utc::now()) {
                    Err(AuthError::malformed(
                        &self.name,
                        format!(
                            "exchange returned a credential that expired at {}",
                            outcome.credential.expires_at
                        ),
                    ))
                } else {
                    Ok(outcome)
                }
            });

        self.attempts.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok(outcome) => {
                if let Some(rotated) = outcome.rotated_refresh {
                    app_log!(info, "{}: refresh secret rotated", self.name);
                    slot.refresh_secret = Some(rotated);
                }
                slot.last_failure = None;
                slot.current = Some(outcome.credential.clone());
                app_log!(
                    info,
                    "{}: refreshed, valid until {}",
                    self.name,
                    outcome.credential.expires_at
                );
                Ok(outcome.credential)
            }
            Err(err) => {
                app_log!(error, "{}: refresh failed: {}", self.name, err);
                slot.last_failure = Some(err.clone());
                if allow_fallback {
                    self.fall_back(slot, err)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// After a failed exchange, keep serving the previous credential while it
    /// is still within its hard expiry.
    fn fall_back(&self, slot: &Slot, err: AuthError) -> Result<Credential, AuthError> {
        match &slot.current {
            Some(prior) if !prior.is_expired() => {
                app_log!(
                    warn,
                    "{}: using previous credential until {} after failed refresh: {}",
                    self.name,
                    prior.expires_at,
                    err
                );
                Ok(prior.clone())
            }
            _ => Err(err),
        }
    }

    #[cfg(test)]
    pub(crate) async fn refresh_secret(&self) -> Option<String> {
        self.slot.lock().await.refresh_secret.clone()
    }
}
