//! Prometheus metrics for motion-server.
//!
//! Provides metrics collection and a Prometheus-compatible `/metrics` endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::AppState;

const EDIT_REQUESTS_TOTAL: &str = "motion_edit_requests_total";
const EDIT_DURATION: &str = "motion_edit_duration_seconds";
const MODEL_FAILURES_TOTAL: &str = "motion_edit_model_failures_total";
const VALIDATION_FAILURES_TOTAL: &str = "motion_validation_failures_total";

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Prometheus metrics endpoint.
#[tracing::instrument(name = "metrics", skip(state))]
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Record a finished edit.
///
/// # Arguments
///
/// * `outcome` - How the edit was resolved (model, fallback, no_rule, heuristic_failed)
/// * `duration_secs` - Wall time of the whole edit, model call included
pub fn record_edit(outcome: &str, duration_secs: f64) {
    counter!(EDIT_REQUESTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
    histogram!(EDIT_DURATION, "outcome" => outcome.to_string()).record(duration_secs);
}

/// Record a model path failure that triggered the fallback.
///
/// # Arguments
///
/// * `kind` - Failure kind (timeout, unavailable, malformed, invalid_shape)
pub fn record_model_failure(kind: &str) {
    counter!(MODEL_FAILURES_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record an input validation failure.
///
/// # Arguments
///
/// * `validation_type` - Field that failed (prompt, animation_id, animation_data)
pub fn record_validation_failure(validation_type: &str) {
    counter!(
        VALIDATION_FAILURES_TOTAL,
        "type" => validation_type.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these are no-ops; they must not panic.
    #[test]
    fn test_recording_without_recorder() {
        record_edit("fallback", 0.25);
        record_model_failure("timeout");
        record_validation_failure("prompt");
    }
}
