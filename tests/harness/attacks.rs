// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Attack simulation patterns for security testing.

use std::time::Duration;

/// Attack pattern configuration.
///
/// Request `i` comes from client `i % unique_clients` and targets form
/// `(i / unique_clients) % unique_forms`. Time is simulated: the clock
/// advances `step` between requests instead of sleeping.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of requests to send
    pub total_requests: usize,
    /// Number of unique client addresses to simulate
    pub unique_clients: usize,
    /// Number of unique forms targeted
    pub unique_forms: usize,
    /// Simulated time between requests
    pub step: Duration,
    /// Requests in flight at once
    pub concurrency: usize,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_requests: 100,
            unique_clients: 1,
            unique_forms: 1,
            step: Duration::ZERO,
            concurrency: 1,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// Single client flood - one bot hammering one form.
    pub fn single_client_flood() -> Self {
        Self {
            total_requests: 200,
            step: Duration::from_secs(1),
            ..Default::default()
        }
    }

    /// Distributed attack - many clients, few submissions each.
    pub fn distributed_attack() -> Self {
        Self {
            total_requests: 500,
            unique_clients: 100,
            step: Duration::from_millis(100),
            ..Default::default()
        }
    }

    /// Form hopping - one client spreading across every form on the site.
    pub fn form_hopping() -> Self {
        Self {
            total_requests: 300,
            unique_forms: 20,
            step: Duration::from_secs(2),
            ..Default::default()
        }
    }

    /// Concurrent flood - one client firing parallel submissions.
    pub fn concurrent_flood() -> Self {
        Self {
            total_requests: 400,
            concurrency: 32,
            ..Default::default()
        }
    }

    /// Slow drip - paced to stay inside the limit.
    pub fn slow_drip(limit: u32, window: Duration) -> Self {
        Self {
            total_requests: 3 * limit as usize,
            step: window / limit + Duration::from_secs(1),
            ..Default::default()
        }
    }

    /// Number of distinct `(form, client)` buckets the attack touches.
    pub fn buckets(&self) -> usize {
        (self.unique_clients * self.unique_forms).min(self.total_requests)
    }

    /// Simulated time from the first request to the last.
    pub fn span(&self) -> Duration {
        self.step * self.total_requests.saturating_sub(1) as u32
    }
}

/// Expected outcomes for different attack types.
pub struct AttackExpectations {
    /// Upper bound on accepted submissions across all buckets
    pub max_accepted: usize,
    /// Upper bound on accepted submissions for any single bucket
    pub max_per_bucket: usize,
    /// Description of expected behavior
    pub description: &'static str,
}

impl AttackConfig {
    /// Get expected outcomes for this attack pattern under `limit` per `window`.
    pub fn expectations(&self, limit: u32, window: Duration) -> AttackExpectations {
        let limit = limit as usize;
        let per_bucket_requests = self.total_requests.div_ceil(self.buckets().max(1));
        // Gap between two requests to the same bucket
        let bucket_step = self.step * self.buckets() as u32;

        if bucket_step * limit as u32 > window {
            AttackExpectations {
                max_accepted: self.total_requests,
                max_per_bucket: per_bucket_requests,
                description: "Paced below the limit, nothing should be refused",
            }
        } else {
            // Each window the span touches can admit a full allowance
            let windows = (self.span().as_secs() / window.as_secs().max(1)) as usize + 1;
            let max_per_bucket = (limit * windows).min(per_bucket_requests);
            AttackExpectations {
                max_accepted: (max_per_bucket * self.buckets()).min(self.total_requests),
                max_per_bucket,
                description: "Each bucket capped at the limit per window",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_flood_expectations() {
        let expected = AttackConfig::single_client_flood().expectations(10, HOUR);
        assert_eq!(expected.max_per_bucket, 10);
        assert_eq!(expected.max_accepted, 10);
    }

    #[test]
    fn test_slow_drip_expectations() {
        let config = AttackConfig::slow_drip(10, HOUR);
        let expected = config.expectations(10, HOUR);
        assert_eq!(expected.max_accepted, config.total_requests);
    }

    #[test]
    fn test_distributed_buckets() {
        let config = AttackConfig::distributed_attack();
        assert_eq!(config.buckets(), 100);
        assert_eq!(config.expectations(10, HOUR).max_per_bucket, 5);
    }
}
