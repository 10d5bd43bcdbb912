// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome tallies for attack simulation results.

use std::collections::HashMap;
use submission_guard::{Decision, GuardError, Rejection};

/// Possible outcomes for a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Accepted,
    RateLimited,
    InvalidToken,
    InvalidKey,
    Error,
}

impl Outcome {
    pub fn classify(result: &Result<Decision, GuardError>) -> Self {
        match result {
            Ok(Decision::Accepted { .. }) => Outcome::Accepted,
            Ok(Decision::Rejected(Rejection::RateLimitExceeded { .. })) => Outcome::RateLimited,
            Ok(Decision::Rejected(Rejection::InvalidOrExpiredSubmission)) => Outcome::InvalidToken,
            Err(GuardError::InvalidKey(_)) => Outcome::InvalidKey,
            Err(_) => Outcome::Error,
        }
    }
}

/// Tallies outcomes per attempt and accepted submissions per bucket.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    outcomes: HashMap<Outcome, usize>,
    /// Keyed by (form, client)
    accepted_per_bucket: HashMap<(String, String), usize>,
    clients: HashMap<String, usize>,
}

impl AttackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome, form_id: &str, client_addr: &str) {
        *self.outcomes.entry(outcome).or_default() += 1;
        *self.clients.entry(client_addr.to_string()).or_default() += 1;
        if outcome == Outcome::Accepted {
            *self
                .accepted_per_bucket
                .entry((form_id.to_string(), client_addr.to_string()))
                .or_default() += 1;
        }
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total_requests: self.outcomes.values().sum(),
            accepted: self.count(Outcome::Accepted),
            rate_limited: self.count(Outcome::RateLimited),
            invalid_token: self.count(Outcome::InvalidToken),
            errors: self.count(Outcome::InvalidKey) + self.count(Outcome::Error),
            unique_clients: self.clients.len(),
            max_accepted_per_bucket: self.accepted_per_bucket.values().copied().max().unwrap_or(0),
        }
    }
}

/// Summary of one simulated attack.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total_requests: usize,
    pub accepted: usize,
    pub rate_limited: usize,
    pub invalid_token: usize,
    pub errors: usize,
    pub unique_clients: usize,
    pub max_accepted_per_bucket: usize,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} attempts from {} clients: {} accepted, {} rate limited, {} invalid token, {} errors",
            self.total_requests,
            self.unique_clients,
            self.accepted,
            self.rate_limited,
            self.invalid_token,
            self.errors
        )?;
        write!(f, "busiest bucket accepted {}", self.max_accepted_per_bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_tallies() {
        let mut metrics = AttackMetrics::new();
        metrics.record(Outcome::Accepted, "contact", "10.0.0.1");
        metrics.record(Outcome::Accepted, "contact", "10.0.0.1");
        metrics.record(Outcome::Accepted, "signup", "10.0.0.1");
        metrics.record(Outcome::RateLimited, "contact", "10.0.0.1");
        metrics.record(Outcome::InvalidKey, "", "10.0.0.2");

        let report = metrics.report();
        assert_eq!(report.total_requests, 5);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.rate_limited, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.unique_clients, 2);
        assert_eq!(report.max_accepted_per_bucket, 2);
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            Outcome::classify(&Ok(Decision::Accepted { remaining: Some(1) })),
            Outcome::Accepted
        );
        assert_eq!(
            Outcome::classify(&Ok(Decision::Rejected(Rejection::InvalidOrExpiredSubmission))),
            Outcome::InvalidToken
        );
        assert_eq!(
            Outcome::classify(&Err(GuardError::InvalidKey("form_id"))),
            Outcome::InvalidKey
        );
    }
}
