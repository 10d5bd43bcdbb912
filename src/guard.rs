// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission guard.
//!
//! Each evaluation runs two checks against one `(form_id, client_addr)`
//! bucket:
//!
//! 1. Submission token. The first attempt in a token lifetime issues one;
//!    later attempts must find a token that still verifies. A token that
//!    fails verification (stale form, rotated secret, tampered store entry)
//!    rejects the attempt without touching the rate window.
//! 2. Sliding window. Timestamps older than the window are dropped; if the
//!    remainder has reached the limit the attempt is rejected and not
//!    recorded, otherwise it is appended.
//!
//! Both checks run under a per-bucket lock taken from a fixed set of shards,
//! so concurrent attempts from one client cannot overshoot the limit while
//! unrelated clients proceed in parallel.

use crate::bucket::{BucketHasher, BucketKey, GuardSecret};
use crate::config::{FailurePolicy, GuardConfig, SubmissionLimit};
use crate::error::{ConfigError, GuardError, StoreError};
use crate::store::ExpiringStore;
use crate::token::{TokenIssuer, SUBMISSION_PURPOSE};
use crate::window::SubmissionWindow;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of evaluating a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Submission may proceed
    Accepted {
        /// Submissions left in the current window; `None` when the guard
        /// failed open and could not count
        remaining: Option<u32>,
    },
    /// Submission must be refused
    Rejected(Rejection),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted { .. })
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Decision::Accepted { .. } => None,
            Decision::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Reason a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The bucket's submission token no longer verifies. Reloading the form
    /// once the token has expired clears it.
    InvalidOrExpiredSubmission,
    /// The bucket has used its allowance for the current window.
    RateLimitExceeded {
        limit: u32,
        window: Duration,
        /// Time until the oldest counted submission leaves the window
        retry_after: Duration,
    },
}

impl Rejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidOrExpiredSubmission => "invalid_or_expired_submission",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::InvalidOrExpiredSubmission => None,
            Self::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
        }
    }
}

/// The user-facing message for the rejection.
impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOrExpiredSubmission => write!(f, "Invalid or expired submission."),
            Self::RateLimitExceeded { limit, window, .. } if window.as_secs() == 3600 => write!(
                f,
                "You have reached the submission limit ({limit} per hour). Please wait."
            ),
            Self::RateLimitExceeded { limit, window, .. } => write!(
                f,
                "You have reached the submission limit ({limit} per {} seconds). Please wait.",
                window.as_secs()
            ),
        }
    }
}

/// Thread-safe submission guard.
pub struct SubmissionGuard {
    store: Arc<dyn ExpiringStore>,
    limit: Arc<SubmissionLimit>,
    hasher: BucketHasher,
    issuer: TokenIssuer,
    /// Per-bucket lock shards
    locks: Vec<Mutex<()>>,
    window: Duration,
    store_timeout: Duration,
    failure_policy: FailurePolicy,
}

impl SubmissionGuard {
    /// Create a guard over `store`, taking the secret from the configuration
    /// (or generating one when unset).
    pub fn new(config: &GuardConfig, store: Arc<dyn ExpiringStore>) -> Result<Self, ConfigError> {
        let secret = config.guard_secret()?;
        Self::with_secret(config, store, &secret)
    }

    pub fn with_secret(
        config: &GuardConfig,
        store: Arc<dyn ExpiringStore>,
        secret: &GuardSecret,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let limit = SubmissionLimit::new(config.submissions_per_hour).map_err(|_| {
            ConfigError::Zero {
                field: "submissions_per_hour",
            }
        })?;

        Ok(Self {
            store,
            limit: Arc::new(limit),
            hasher: BucketHasher::new(secret),
            issuer: TokenIssuer::new(secret, config.token_ttl()),
            locks: (0..config.lock_shards).map(|_| Mutex::new(())).collect(),
            window: config.window_duration(),
            store_timeout: config.store_timeout(),
            failure_policy: config.failure_policy,
        })
    }

    /// Handle to the live limit. Updates apply to the next evaluation.
    pub fn limit(&self) -> &Arc<SubmissionLimit> {
        &self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Evaluate one submission attempt at the current time.
    ///
    /// The time is read once the bucket lock is held, so attempts queued on
    /// the same bucket see non-decreasing times.
    pub async fn check(&self, form_id: &str, client_addr: &str) -> Result<Decision, GuardError> {
        self.evaluate_at(form_id, client_addr, None).await
    }

    /// Evaluate one submission attempt at `now`.
    ///
    /// Must be called exactly once per attempt: every accepted call counts
    /// against the window. Callers whose times reach the same bucket slightly
    /// out of order are tolerated up to
    /// [`MAX_CLOCK_SKEW`](crate::token::MAX_CLOCK_SKEW).
    pub async fn evaluate(
        &self,
        form_id: &str,
        client_addr: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, GuardError> {
        self.evaluate_at(form_id, client_addr, Some(now)).await
    }

    async fn evaluate_at(
        &self,
        form_id: &str,
        client_addr: &str,
        now: Option<DateTime<Utc>>,
    ) -> Result<Decision, GuardError> {
        let bucket = self.hasher.bucket(form_id, client_addr)?;

        match self.evaluate_bucket(&bucket, now).await {
            Err(GuardError::StoreUnavailable(err)) if self.failure_policy == FailurePolicy::Open => {
                warn!(bucket = %bucket, error = %err, "Store unavailable, failing open");
                Ok(Decision::Accepted { remaining: None })
            }
            Err(GuardError::StoreUnavailable(err)) => {
                warn!(bucket = %bucket, error = %err, "Store unavailable, failing closed");
                Err(GuardError::StoreUnavailable(err))
            }
            other => other,
        }
    }

    async fn evaluate_bucket(
        &self,
        bucket: &BucketKey,
        now: Option<DateTime<Utc>>,
    ) -> Result<Decision, GuardError> {
        let lock = &self.locks[bucket.shard(self.locks.len())];
        let _held = self
            .bounded("bucket lock", async { Ok::<_, StoreError>(lock.lock().await) })
            .await?;
        let now = now.unwrap_or_else(Utc::now);

        if !self.check_token(bucket, now).await? {
            info!(bucket = %bucket, "Submission token invalid or expired");
            return Ok(Decision::Rejected(Rejection::InvalidOrExpiredSubmission));
        }

        self.check_window(bucket, now).await
    }

    /// Issue the bucket's token if it has none, otherwise verify the one held.
    async fn check_token(&self, bucket: &BucketKey, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let key = bucket.token_key();

        if let Some(stored) = self.bounded("get token", self.store.get(&key)).await? {
            return Ok(self.verify_stored(&stored, now));
        }

        let token = self.issuer.issue(SUBMISSION_PURPOSE, now);
        let issued = self
            .bounded(
                "issue token",
                self.store
                    .compare_and_swap(&key, None, token.into_bytes(), self.issuer.ttl()),
            )
            .await?;
        if issued {
            debug!(bucket = %bucket, "Issued submission token");
            return Ok(true);
        }

        // Another writer sharing the store issued first
        match self.bounded("get token", self.store.get(&key)).await? {
            Some(stored) => Ok(self.verify_stored(&stored, now)),
            None => Ok(true),
        }
    }

    fn verify_stored(&self, stored: &[u8], now: DateTime<Utc>) -> bool {
        std::str::from_utf8(stored)
            .map(|token| self.issuer.verify(token, SUBMISSION_PURPOSE, now))
            .unwrap_or(false)
    }

    async fn check_window(
        &self,
        bucket: &BucketKey,
        now: DateTime<Utc>,
    ) -> Result<Decision, GuardError> {
        let key = bucket.window_key();
        let now_secs = now.timestamp();

        let mut window = match self.bounded("get window", self.store.get(&key)).await? {
            Some(bytes) => SubmissionWindow::decode(&bytes).map_err(|e| StoreError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })?,
            None => SubmissionWindow::default(),
        };
        window.prune(now_secs, self.window);

        let limit = self.limit.get();
        if window.len() >= limit as usize {
            let retry_after = window.retry_after(now_secs, self.window);
            info!(
                bucket = %bucket,
                limit,
                counted = window.len(),
                retry_after_secs = retry_after.as_secs(),
                "Submission rate limit exceeded"
            );
            return Ok(Decision::Rejected(Rejection::RateLimitExceeded {
                limit,
                window: self.window,
                retry_after,
            }));
        }

        window.record(now_secs);
        let encoded = window
            .encode()
            .map_err(|e| StoreError::Backend(format!("window encoding failed: {e}")))?;
        self.bounded("set window", self.store.set(&key, encoded, self.window))
            .await?;

        let remaining = limit.saturating_sub(window.len() as u32);
        debug!(bucket = %bucket, remaining, "Submission accepted");
        Ok(Decision::Accepted {
            remaining: Some(remaining),
        })
    }

    /// Run a store call (or lock wait) under the configured timeout.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                after: self.store_timeout,
            }),
        }
    }
}
