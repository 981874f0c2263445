//! Metrics definitions for the meeting access service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `meet_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `endpoint`: the fixed route table, everything else is `/other`
//! - `reason`: the five denial reasons
//! - `operation`: registry operations named in code
//! - `caller`: `authenticated` or `guest`

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("meet_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // RSA signing is the dominant cost of issuance
        .set_buckets_for_metric(
            Matcher::Prefix("meet_token_issuance".to_string()),
            &[0.0005, 0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("meet_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `meet_http_requests_total`, `meet_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("meet_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("meet_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Collapse meeting ids so the label set stays fixed.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/ready" | "/metrics" | "/api/v1/tokens" | "/api/v1/meetings/lookup" => {
            path.to_string()
        }
        _ => normalize_meeting_endpoint(path),
    }
}

fn normalize_meeting_endpoint(path: &str) -> String {
    let Some(rest) = path.strip_prefix("/api/v1/meetings/") else {
        return "/other".to_string();
    };

    let segments: Vec<&str> = rest.split('/').collect();
    match segments.as_slice() {
        [id] if !id.is_empty() => "/api/v1/meetings/{id}".to_string(),
        [id, "join"] if !id.is_empty() => "/api/v1/meetings/{id}/join".to_string(),
        [id, "kill-switch"] if !id.is_empty() => "/api/v1/meetings/{id}/kill-switch".to_string(),
        _ => "/other".to_string(),
    }
}

// ============================================================================
// Token Issuance Metrics
// ============================================================================

/// Record a capability token issuance attempt.
///
/// Metric: `meet_token_issuance_total`, `meet_token_issuance_duration_seconds`
/// Labels: `outcome` ("success", "configuration_error", "signing_error")
pub fn record_token_issuance(outcome: &str, duration: Duration) {
    histogram!("meet_token_issuance_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("meet_token_issuance_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Eligibility Metrics
// ============================================================================

/// Record a refused join.
///
/// Metric: `meet_eligibility_denials_total`
/// Labels: `reason`, `caller`
pub fn record_eligibility_denial(reason: &str, caller: &str) {
    counter!("meet_eligibility_denials_total",
        "reason" => reason.to_string(),
        "caller" => caller.to_string()
    )
    .increment(1);
}

// ============================================================================
// Lifecycle Metrics
// ============================================================================

/// Record an appended participant record.
///
/// Metric: `meet_joins_recorded_total`, `meet_meetings_started_total`
/// Labels: `caller`
pub fn record_join(caller: &str, started_meeting: bool) {
    counter!("meet_joins_recorded_total",
        "caller" => caller.to_string()
    )
    .increment(1);

    if started_meeting {
        counter!("meet_meetings_started_total").increment(1);
    }
}

/// Record a kill switch toggle.
///
/// Metric: `meet_kill_switch_toggles_total`
/// Labels: `action` ("disable" or "enable")
pub fn record_kill_switch(action: &str) {
    counter!("meet_kill_switch_toggles_total",
        "action" => action.to_string()
    )
    .increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record registry query execution.
///
/// Metric: `meet_db_query_duration_seconds`, `meet_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("meet_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("meet_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // No recorder is installed here; the metrics facade falls back to a
    // no-op recorder, so these only check that recording never panics.

    #[test]
    fn test_record_http_request() {
        record_http_request("POST", "/api/v1/tokens", 200, Duration::from_millis(5));
        record_http_request("GET", "/api/v1/meetings/42", 404, Duration::from_millis(3));
        record_http_request(
            "PATCH",
            "/api/v1/meetings/42/kill-switch",
            504,
            Duration::from_secs(30),
        );
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(400), "error");
        assert_eq!(categorize_status_code(403), "error");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_endpoint_known_paths() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/ready"), "/ready");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/api/v1/tokens"), "/api/v1/tokens");
        assert_eq!(
            normalize_endpoint("/api/v1/meetings/lookup"),
            "/api/v1/meetings/lookup"
        );
    }

    #[test]
    fn test_normalize_endpoint_meeting_paths() {
        assert_eq!(
            normalize_endpoint("/api/v1/meetings/17"),
            "/api/v1/meetings/{id}"
        );
        assert_eq!(
            normalize_endpoint("/api/v1/meetings/17/join"),
            "/api/v1/meetings/{id}/join"
        );
        assert_eq!(
            normalize_endpoint("/api/v1/meetings/17/kill-switch"),
            "/api/v1/meetings/{id}/kill-switch"
        );
    }

    #[test]
    fn test_normalize_endpoint_unknown_paths() {
        assert_eq!(normalize_endpoint("/"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/meetings"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/meetings/"), "/other");
        assert_eq!(normalize_endpoint("/api/v1/meetings/17/invite"), "/other");
        assert_eq!(normalize_endpoint("/api/v2/tokens"), "/other");
    }

    #[test]
    fn test_record_domain_metrics() {
        record_token_issuance("success", Duration::from_micros(900));
        record_token_issuance("signing_error", Duration::from_micros(100));
        record_eligibility_denial("meeting_disabled", "guest");
        record_join("authenticated", true);
        record_join("guest", false);
        record_kill_switch("disable");
        record_db_query("find_by_room_name", "success", Duration::from_millis(2));
    }
}
