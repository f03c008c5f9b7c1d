//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays
//! the current aggregator configuration.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::config::{
    Config, DEFAULT_BIND_ADDR, DEFAULT_PORT, DEFAULT_PROC_ROOT, DEFAULT_SAMPLE_INTERVAL_MS,
    DEFAULT_SCAN_INTERVAL,
};
use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");

    state.health_stats.record_http_request();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        render_config_text(&state.config),
    )
}

fn row(out: &mut String, key: &str, value: impl std::fmt::Display) {
    writeln!(out, "{:28}{}", format!("{}:", key), value).ok();
}

fn heading(out: &mut String, title: &str) {
    writeln!(out, "{}", title).ok();
    writeln!(out, "{}", "-".repeat(title.len())).ok();
}

pub fn render_config_text(cfg: &Config) -> String {
    let mut out = String::new();

    writeln!(out, "ZAGGREGATOR - CONFIGURATION").ok();
    writeln!(out, "===========================").ok();
    writeln!(out).ok();

    heading(&mut out, "SERVER CONFIGURATION");
    row(&mut out, "bind", cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR));
    row(&mut out, "port", cfg.port.unwrap_or(DEFAULT_PORT));
    writeln!(out).ok();

    heading(&mut out, "SCANNING");
    row(
        &mut out,
        "scan_interval_seconds",
        cfg.scan_interval_seconds.unwrap_or(DEFAULT_SCAN_INTERVAL),
    );
    row(
        &mut out,
        "sample_interval_ms",
        cfg.sample_interval_ms.unwrap_or(DEFAULT_SAMPLE_INTERVAL_MS),
    );
    row(&mut out, "kernel_boundary", cfg.kernel_boundary.unwrap_or_default());
    row(
        &mut out,
        "parallelism",
        cfg.parallelism
            .map(|n| n.to_string())
            .unwrap_or_else(|| "auto".into()),
    );
    row(
        &mut out,
        "max_processes",
        cfg.max_processes
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unlimited".into()),
    );
    row(
        &mut out,
        "proc_root",
        cfg.proc_root
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| DEFAULT_PROC_ROOT.into()),
    );
    row(
        &mut out,
        "test_data_file",
        cfg.test_data_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".into()),
    );
    writeln!(out).ok();

    heading(&mut out, "EXPORT");
    row(&mut out, "compat_metrics", cfg.compat_metrics.unwrap_or(false));
    row(&mut out, "metric_names", cfg.metric_set().names().join(", "));
    row(
        &mut out,
        "exclude_bundles",
        cfg.exclude_bundles
            .as_ref()
            .filter(|v| !v.is_empty())
            .map(|v| v.join(", "))
            .unwrap_or_else(|| "none".into()),
    );
    writeln!(out).ok();

    heading(&mut out, "SAMPLE STORE RETENTION");
    row(&mut out, "max_memory_mb", cfg.retention.max_memory_mb);
    row(&mut out, "expected_bundles", cfg.retention.expected_bundles);
    row(&mut out, "min_entries_per_bundle", cfg.retention.min_entries_per_bundle);
    row(&mut out, "max_entries_per_bundle", cfg.retention.max_entries_per_bundle);
    row(&mut out, "max_sample_age_seconds", cfg.retention.max_sample_age_seconds);
    writeln!(out).ok();

    heading(&mut out, "FEATURES");
    row(&mut out, "enable_health", cfg.enable_health.unwrap_or(true));
    row(&mut out, "enable_telemetry", cfg.enable_telemetry.unwrap_or(true));
    row(&mut out, "log_level", cfg.log_level.as_deref().unwrap_or("info"));
    writeln!(out).ok();

    writeln!(out, "{}", FOOTER_TEXT).ok();
    out
}
