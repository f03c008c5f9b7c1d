//! Metrics endpoint handler for Prometheus scraping.
//!
//! This module provides the `/metrics` endpoint handler that exports the
//! bundle table of the last scan in Prometheus text format. Scans run on
//! their own schedule; a scrape never waits for one.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let exported = {
        let cache = state.cache.read().await;

        state.scan_duration.set(cache.update_duration_seconds);
        state
            .scan_success
            .set(if cache.update_success { 1.0 } else { 0.0 });
        state
            .scan_updating
            .set(if cache.is_updating { 1.0 } else { 0.0 });

        match &cache.table {
            Some(table) => state
                .metrics
                .export_table(table, |name| state.config.is_excluded(name)),
            None => {
                debug!("No scan finished yet, exporting telemetry only");
                state.metrics.reset_bundle_metrics();
                0
            }
        }
    };

    let families = state.registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    let request_duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    state.health_stats.record_metrics_endpoint_call();
    state
        .health_stats
        .record_request_duration(request_duration_ms);
    state.health_stats.record_http_request();

    state.scrape_duration.set(start.elapsed().as_secs_f64());

    debug!(
        "Metrics request completed: {} bundles, {} bytes, {:.3}ms",
        exported,
        buffer.len(),
        request_duration_ms
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::scan_updater::update_cache;
    use crate::state::test_support::{fixture_source, test_config, test_state};
    use crate::state::AppState;

    #[tokio::test]
    async fn test_metrics_export_bundles() {
        let state = test_state();
        update_cache(&state).await.expect("scan");

        let body = metrics_handler(State(state.clone())).await.expect("metrics");
        assert!(body.contains("zaggregator_bundle_memory_rss_bytes{bundle=\"cron\"} 4096"));
        assert!(body.contains("zaggregator_bundle_processes{bundle=\"nginx:daemon\"} 2"));
        assert!(body.contains("zaggregator_host_cpu_idle_ratio 0.87"));
        assert!(body.contains("zaggregator_bundles_total 3"));
    }

    #[tokio::test]
    async fn test_metrics_before_first_scan() {
        let state = test_state();
        let body = metrics_handler(State(state)).await.expect("metrics");
        assert!(!body.contains("bundle=\""));
        assert!(body.contains("zaggregator_scan_success 0"));
    }

    #[tokio::test]
    async fn test_excluded_bundle_not_exported() {
        let config = Config {
            exclude_bundles: Some(vec!["kernel".to_string()]),
            ..test_config()
        };
        let state = AppState::new(config, fixture_source()).expect("state");
        update_cache(&state).await.expect("scan");

        let body = metrics_handler(State(state)).await.expect("metrics");
        assert!(!body.contains("bundle=\"kernel\""));
        assert!(body.contains("bundle=\"cron\""));
    }
}
