// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the submission guard service.
//!
//! The form backend calls `/evaluate` once per submission attempt and turns a
//! refusal into a validation error on the form's submit control (the field
//! keyed `submit`, or the first field when the form has none). The page
//! must re-enable its submit button when it shows that error, or the user
//! cannot retry.

use crate::config::Config;
use crate::error::GuardError;
use crate::guard::{Decision, Rejection, SubmissionGuard};
use crate::metrics::GuardMetrics;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Form field that rejection messages attach to.
pub const SUBMIT_FIELD: &str = "submit";

/// Shared application state.
pub struct AppState {
    pub guard: SubmissionGuard,
    pub metrics: GuardMetrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, guard: SubmissionGuard) -> prometheus::Result<Self> {
        let metrics = GuardMetrics::new()?;
        metrics.set_limit(guard.limit().get());
        Ok(Self {
            guard,
            metrics,
            config,
        })
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Submission evaluation request.
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub form_id: String,
    pub client_addr: String,
}

/// Submission evaluation response.
#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl From<&Decision> for EvaluateResponse {
    fn from(decision: &Decision) -> Self {
        match decision {
            Decision::Accepted { remaining } => Self {
                allowed: true,
                reason: None,
                message: None,
                field: None,
                limit: None,
                remaining: *remaining,
                retry_after_secs: None,
            },
            Decision::Rejected(rejection) => Self {
                allowed: false,
                reason: Some(rejection.code()),
                message: Some(rejection.to_string()),
                field: Some(SUBMIT_FIELD),
                limit: match rejection {
                    Rejection::RateLimitExceeded { limit, .. } => Some(*limit),
                    Rejection::InvalidOrExpiredSubmission => None,
                },
                remaining: None,
                retry_after_secs: rejection.retry_after().map(|d| d.as_secs()),
            },
        }
    }
}

/// Limit update request.
#[derive(Debug, Deserialize)]
pub struct LimitRequest {
    pub submissions_per_hour: u32,
}

/// Current limit.
#[derive(Debug, Serialize)]
pub struct LimitResponse {
    pub submissions_per_hour: u32,
    pub window_secs: u64,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/evaluate", post(evaluate))
        .route("/config/limit", get(get_limit).put(put_limit));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "submission-guard",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Evaluate one submission attempt.
pub async fn evaluate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvaluateRequest>,
) -> Response {
    let started = Instant::now();
    let result = state.guard.check(&req.form_id, &req.client_addr).await;
    state.metrics.observe(&result, started.elapsed());

    match result {
        Ok(decision) => {
            match decision.rejection() {
                None => debug!(form_id = %req.form_id, client = %req.client_addr, "Submission allowed"),
                Some(rejection) => info!(
                    form_id = %req.form_id,
                    client = %req.client_addr,
                    reason = rejection.code(),
                    "Submission rejected"
                ),
            }
            // Rejections are 200 with `allowed: false`
            (StatusCode::OK, Json(EvaluateResponse::from(&decision))).into_response()
        }
        Err(err @ GuardError::InvalidKey(_)) => {
            warn!(error = %err, "Invalid evaluation request");
            error_response(StatusCode::BAD_REQUEST, "INVALID_KEY", &err)
        }
        Err(err @ GuardError::StoreUnavailable(_)) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE", &err)
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", &err),
    }
}

/// Current submission limit.
pub async fn get_limit(State(state): State<Arc<AppState>>) -> Json<LimitResponse> {
    Json(LimitResponse {
        submissions_per_hour: state.guard.limit().get(),
        window_secs: state.guard.window().as_secs(),
    })
}

/// Replace the submission limit. Requires the admin bearer token.
pub async fn put_limit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<LimitRequest>,
) -> Response {
    let Some(expected) = state.config.admin.token.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    // Compare digests so the check does not leak a matching prefix
    let authorized = presented
        .map(|token| blake3::hash(token.as_bytes()) == blake3::hash(expected.as_bytes()))
        .unwrap_or(false);
    if !authorized {
        warn!("Rejected limit update with missing or wrong admin token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match state.guard.limit().set(req.submissions_per_hour) {
        Ok(previous) => {
            state.metrics.set_limit(req.submissions_per_hour);
            info!(
                previous,
                current = req.submissions_per_hour,
                "Submission limit updated"
            );
            get_limit(State(state)).await.into_response()
        }
        Err(err) => error_response(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_LIMIT", &err),
    }
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.set_limit(state.guard.limit().get());
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn error_response(status: StatusCode, code: &'static str, err: &GuardError) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code,
        }),
    )
        .into_response()
}
