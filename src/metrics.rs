// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for the guard service.

use crate::error::GuardError;
use crate::guard::{Decision, Rejection};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Guard metrics, registered on a private registry.
#[derive(Clone)]
pub struct GuardMetrics {
    registry: Registry,
    decisions: IntCounterVec,
    latency: Histogram,
    limit: IntGauge,
}

impl GuardMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new(
                "submission_guard_decisions_total",
                "Submission evaluations by outcome",
            ),
            &["outcome"],
        )?;
        let latency = Histogram::with_opts(
            HistogramOpts::new(
                "submission_guard_evaluate_seconds",
                "Time spent evaluating a submission",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5]),
        )?;
        let limit = IntGauge::new(
            "submission_guard_limit",
            "Configured submissions per client per form per window",
        )?;

        registry.register(Box::new(decisions.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(limit.clone()))?;

        Ok(Self {
            registry,
            decisions,
            latency,
            limit,
        })
    }

    /// Record the result of one evaluation.
    pub fn observe(&self, result: &Result<Decision, GuardError>, elapsed: Duration) {
        self.latency.observe(elapsed.as_secs_f64());
        self.decisions.with_label_values(&[outcome(result)]).inc();
    }

    pub fn set_limit(&self, limit: u32) {
        self.limit.set(i64::from(limit));
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    #[cfg(test)]
    fn count(&self, outcome: &str) -> u64 {
        self.decisions.with_label_values(&[outcome]).get()
    }
}

fn outcome(result: &Result<Decision, GuardError>) -> &'static str {
    match result {
        Ok(Decision::Accepted { remaining: Some(_) }) => "accepted",
        Ok(Decision::Accepted { remaining: None }) => "accepted_fail_open",
        Ok(Decision::Rejected(Rejection::RateLimitExceeded { .. })) => "rate_limited",
        Ok(Decision::Rejected(Rejection::InvalidOrExpiredSubmission)) => "invalid_token",
        Err(GuardError::InvalidKey(_)) => "invalid_key",
        Err(GuardError::StoreUnavailable(_)) => "store_unavailable",
        Err(GuardError::InvalidLimit(_)) => "invalid_limit",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_and_render() {
        let metrics = GuardMetrics::new().unwrap();
        metrics.set_limit(10);
        metrics.observe(
            &Ok(Decision::Accepted { remaining: Some(9) }),
            Duration::from_micros(40),
        );
        metrics.observe(
            &Ok(Decision::Rejected(Rejection::InvalidOrExpiredSubmission)),
            Duration::from_micros(40),
        );
        metrics.observe(&Err(GuardError::InvalidKey("form_id")), Duration::ZERO);

        assert_eq!(metrics.count("accepted"), 1);
        assert_eq!(metrics.count("invalid_token"), 1);
        assert_eq!(metrics.count("invalid_key"), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("submission_guard_decisions_total"));
        assert!(text.contains("submission_guard_limit 10"));
    }
}
