// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Submission Guard
//!
//! Request-level abuse guard for form endpoints. For every submission the
//! caller identifies by `(form_id, client_addr)` it decides whether to accept
//! or reject:
//!
//! - Per-client, per-form sliding window (10 submissions per hour default)
//! - Short-lived submission token issued on first contact and verified on
//!   later attempts (10 minute lifetime)
//! - Per-bucket atomicity through sharded locks; no overshoot under
//!   concurrent attempts from one client
//! - Runtime-adjustable limit with no restart
//!
//! State lives in an [`ExpiringStore`]; [`MemoryStore`] serves a single
//! process.
//!
//! ## Integration contract
//!
//! Call [`SubmissionGuard::evaluate`] exactly once per submission attempt.
//! Show a [`Rejection`] as a validation error on the form's submit control
//! using its `Display` text, and re-enable that control so the user can
//! retry. Treat [`GuardError::StoreUnavailable`] as a server error.

pub mod bucket;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod metrics;
pub mod store;
pub mod token;
pub mod window;

pub use config::{Config, FailurePolicy, GuardConfig, SubmissionLimit};
pub use error::{ConfigError, GuardError, StoreError};
pub use guard::{Decision, Rejection, SubmissionGuard};
pub use store::{ExpiringStore, MemoryStore};
pub use token::{TokenIssuer, TokenValue};
