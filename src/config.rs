// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the submission guard.
//!
//! Defaults: 10 submissions per client per form per hour, 10 minute
//! submission tokens, fail closed when the store is unreachable.

use crate::bucket::GuardSecret;
use crate::error::{ConfigError, GuardError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Longest accepted window or token lifetime, in seconds (one year).
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 3600;

/// Configuration for the submission guard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Guard configuration
    #[serde(default)]
    pub guard: GuardConfig,

    /// Administrative endpoint configuration
    #[serde(default)]
    pub admin: AdminConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// What the guard does when the store fails or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Surface `StoreUnavailable` to the caller.
    Closed,
    /// Accept the submission and log a warning.
    Open,
}

impl FromStr for FailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "closed" => Ok(Self::Closed),
            "open" => Ok(Self::Open),
            _ => Err(()),
        }
    }
}

/// Rate limiting and token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Accepted submissions per client per form per window (default: 10)
    #[serde(default = "default_submissions_per_hour")]
    pub submissions_per_hour: u32,

    /// Trailing window length in seconds (default: 3600)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Submission token lifetime in seconds (default: 600)
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,

    /// Upper bound on any single store call or bucket lock wait (default: 2000)
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Number of bucket lock shards (default: 64)
    #[serde(default = "default_lock_shards")]
    pub lock_shards: usize,

    /// Behaviour on store failure (default: closed)
    #[serde(default = "default_failure_policy")]
    pub failure_policy: FailurePolicy,

    /// Hex-encoded 32-byte secret. Random per process when unset.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bearer token for `PUT /config/limit`. Endpoint disabled when unset.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_submissions_per_hour() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    3600
}

fn default_token_ttl_secs() -> u64 {
    600
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_lock_shards() -> usize {
    64
}

fn default_failure_policy() -> FailurePolicy {
    FailurePolicy::Closed
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            guard: GuardConfig::default(),
            admin: AdminConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            submissions_per_hour: default_submissions_per_hour(),
            window_secs: default_window_secs(),
            token_ttl_secs: default_token_ttl_secs(),
            store_timeout_ms: default_store_timeout_ms(),
            lock_shards: default_lock_shards(),
            failure_policy: default_failure_policy(),
            secret: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl GuardConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the token lifetime
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    /// Get the store call timeout
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Resolve the configured secret, generating one if unset.
    pub fn guard_secret(&self) -> Result<GuardSecret, ConfigError> {
        match &self.secret {
            Some(encoded) => GuardSecret::from_hex(encoded),
            None => Ok(GuardSecret::random()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = [
            ("submissions_per_hour", self.submissions_per_hour == 0),
            ("window_secs", self.window_secs == 0),
            ("token_ttl_secs", self.token_ttl_secs == 0),
            ("store_timeout_ms", self.store_timeout_ms == 0),
            ("lock_shards", self.lock_shards == 0),
        ];
        if let Some(&(field, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ConfigError::Zero { field });
        }
        for (field, secs) in [
            ("window_secs", self.window_secs),
            ("token_ttl_secs", self.token_ttl_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                return Err(ConfigError::TooLarge {
                    field,
                    max: MAX_DURATION_SECS,
                });
            }
        }
        if let Some(encoded) = &self.secret {
            GuardSecret::from_hex(encoded)?;
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// - `BIND_ADDR`
    /// - `SUBMISSIONS_PER_HOUR`
    /// - `WINDOW_SECS`
    /// - `TOKEN_TTL_SECS`
    /// - `STORE_TIMEOUT_MS`
    /// - `LOCK_SHARDS`
    /// - `FAILURE_POLICY` (`closed` or `open`)
    /// - `GUARD_SECRET` (64 hex characters)
    /// - `ADMIN_TOKEN`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GuardConfig::default();
        let guard = GuardConfig {
            submissions_per_hour: parse_var(&lookup, "SUBMISSIONS_PER_HOUR")?
                .unwrap_or(defaults.submissions_per_hour),
            window_secs: parse_var(&lookup, "WINDOW_SECS")?.unwrap_or(defaults.window_secs),
            token_ttl_secs: parse_var(&lookup, "TOKEN_TTL_SECS")?
                .unwrap_or(defaults.token_ttl_secs),
            store_timeout_ms: parse_var(&lookup, "STORE_TIMEOUT_MS")?
                .unwrap_or(defaults.store_timeout_ms),
            lock_shards: parse_var(&lookup, "LOCK_SHARDS")?.unwrap_or(defaults.lock_shards),
            failure_policy: parse_var(&lookup, "FAILURE_POLICY")?
                .unwrap_or(defaults.failure_policy),
            secret: lookup("GUARD_SECRET").filter(|s| !s.trim().is_empty()),
        };
        guard.validate()?;

        Ok(Config {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(default_bind_addr),
            guard,
            admin: AdminConfig {
                token: lookup("ADMIN_TOKEN").filter(|s| !s.trim().is_empty()),
            },
            ..Default::default()
        })
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

/// Process-wide submissions-per-window limit.
///
/// Shared between the guard and whatever administers it. Reads are single
/// atomic loads, so an update is visible to the next evaluation without a
/// restart and a reader never sees a partially written value.
#[derive(Debug)]
pub struct SubmissionLimit {
    per_window: AtomicU32,
}

impl SubmissionLimit {
    pub fn new(per_window: u32) -> Result<Self, GuardError> {
        if per_window == 0 {
            return Err(GuardError::InvalidLimit(per_window));
        }
        Ok(Self {
            per_window: AtomicU32::new(per_window),
        })
    }

    pub fn get(&self) -> u32 {
        self.per_window.load(Ordering::Acquire)
    }

    /// Replace the limit, returning the previous value.
    pub fn set(&self, per_window: u32) -> Result<u32, GuardError> {
        if per_window == 0 {
            return Err(GuardError::InvalidLimit(per_window));
        }
        Ok(self.per_window.swap(per_window, Ordering::AcqRel))
    }
}
