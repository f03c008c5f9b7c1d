//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! scan health statistics and sample store status.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};
use zaggregator::sample_store::StoreStats;

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "zaggregator - process bundle aggregator";

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    state.health_stats.record_http_request();

    let cache = state.cache.read().await;

    // Derive HTTP status from cache state
    let status = if cache.update_success && cache.last_updated.is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let message = if cache.is_updating {
        "OK - Scan running"
    } else if cache.update_success {
        "OK"
    } else {
        "Scan failed"
    };

    let uptime_str = format_uptime(state.health_stats.get_uptime_seconds());
    let last_scan = cache
        .age_seconds()
        .map(|age| format!("{:.1}s ago", age))
        .unwrap_or_else(|| "never".to_string());
    let table = state.health_stats.render_table();
    let store_section = render_store_stats(&state.store.stats());

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\nUptime: {uptime_str}\nLast scan: {last_scan}\n\n{table}\n{store_section}\n{FOOTER_TEXT}"),
    )
}

fn format_uptime(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

/// Renders sample store statistics as a plain-text block.
fn render_store_stats(stats: &StoreStats) -> String {
    let mut out = String::new();
    writeln!(out, "SAMPLE STORE STATUS").ok();
    writeln!(out, "===================").ok();
    writeln!(out).ok();
    writeln!(out, "{:25} | {:>12}", "open", stats.open).ok();
    writeln!(out, "{:25} | {:>12}", "bundles", stats.total_bundles).ok();
    writeln!(out, "{:25} | {:>12}", "max_bundles", stats.max_bundles).ok();
    writeln!(out, "{:25} | {:>12}", "entries", stats.total_entries).ok();
    writeln!(out, "{:25} | {:>12}", "entries_per_bundle", stats.entries_per_bundle).ok();
    writeln!(
        out,
        "{:25} | {:>12}",
        "estimated_ram (KB)",
        stats.estimated_ram_bytes.div_ceil(1024)
    )
    .ok();
    writeln!(out, "{:25} | {:>12}", "max_memory (MB)", stats.max_memory_mb).ok();
    writeln!(out, "{:25} | {:>12}", "max_sample_age (s)", stats.max_sample_age_seconds).ok();
    out
}
