// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding submission window.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accepted-submission timestamps (unix seconds) for one bucket, in the
/// order they were recorded.
///
/// Stored as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionWindow {
    timestamps: Vec<i64>,
}

impl SubmissionWindow {
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Drop every timestamp at or before `now - window`.
    pub fn prune(&mut self, now: i64, window: Duration) {
        let cutoff = now.saturating_sub(window.as_secs() as i64);
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    pub fn record(&mut self, now: i64) {
        self.timestamps.push(now);
    }

    /// Time until the oldest timestamp leaves the window.
    pub fn retry_after(&self, now: i64, window: Duration) -> Duration {
        let Some(oldest) = self.timestamps.iter().min() else {
            return Duration::ZERO;
        };
        let leaves_at = oldest.saturating_add(window.as_secs() as i64);
        Duration::from_secs(leaves_at.saturating_sub(now).max(0) as u64)
    }
}
