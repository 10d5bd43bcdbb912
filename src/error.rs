// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the submission guard.

use std::time::Duration;
use thiserror::Error;

/// Failures raised by an [`ExpiringStore`](crate::store::ExpiringStore)
/// or while waiting on one.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation `{operation}` timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("corrupt entry at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Errors returned by [`SubmissionGuard`](crate::guard::SubmissionGuard).
#[derive(Debug, Error)]
pub enum GuardError {
    /// An identifier was empty. Caller bug; retrying with the same input fails again.
    #[error("invalid key: {0} must not be empty")]
    InvalidKey(&'static str),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("invalid submission limit {0}: must be at least 1")]
    InvalidLimit(u32),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("guard secret must be 64 hex characters (32 bytes)")]
    InvalidSecret,
}
