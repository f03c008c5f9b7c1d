//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with all available endpoints and descriptions.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Endpoints listed on the landing page.
const ENDPOINTS: &[(&str, &str)] = &[
    ("/metrics", "Prometheus-compatible per-bundle metrics"),
    ("/health", "Scan and sample store health statistics (text)"),
    ("/bundles", "Bundle table of the last scan (text, ?format=json)"),
    ("/discovery", "Low-level discovery document of fresh bundles (JSON)"),
    ("/config", "Active runtime configuration (read-only)"),
];

fn format_uptime(uptime_secs: u64) -> String {
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");
    let uptime_str = format_uptime(state.start_time.elapsed().as_secs());
    let bundles = state
        .cache
        .read()
        .await
        .table
        .as_ref()
        .map(|t| t.len().to_string())
        .unwrap_or_else(|| "-".to_string());

    let items: String = ENDPOINTS
        .iter()
        .filter(|(path, _)| *path != "/health" || state.config.enable_health.unwrap_or(true))
        .map(|(path, desc)| {
            format!(
                "        <li>\n            <a href=\"{path}\">{path}</a>\n            <div class=\"endpoint-desc\">{desc}</div>\n        </li>\n"
            )
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>zaggregator</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #333;
            border-bottom: 3px solid #007bff;
            padding-bottom: 15px;
        }}
        .info {{
            background: #e9ecef;
            padding: 15px;
            border-radius: 4px;
            display: flex;
            justify-content: space-around;
        }}
        .info-label {{ font-weight: 600; color: #555; display: block; font-size: 0.9em; }}
        .info-value {{ font-size: 1.2em; color: #007bff; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{
            margin: 20px 0;
            padding: 15px;
            background: #f8f9fa;
            border-left: 4px solid #007bff;
            border-radius: 4px;
        }}
        .endpoint-list a {{ color: #007bff; text-decoration: none; font-weight: 600; }}
        .endpoint-desc {{ color: #666; margin-top: 5px; }}
        .footer {{ margin-top: 40px; color: #666; font-size: 0.9em; text-align: center; }}
        code {{ background: #e9ecef; padding: 2px 6px; border-radius: 3px; }}
    </style>
</head>
<body>
<div class="container">
    <h1>zaggregator</h1>

    <div class="info">
        <div><span class="info-label">Version</span><span class="info-value">{version}</span></div>
        <div><span class="info-label">Uptime</span><span class="info-value">{uptime}</span></div>
        <div><span class="info-label">Bundles</span><span class="info-value">{bundles}</span></div>
    </div>

    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
{items}        <li>
            <code>/bundle/&lt;name&gt;/&lt;metric&gt;</code>
            <div class="endpoint-desc">Newest value of one bundle metric, <code>0.0</code> when unknown or stale</div>
        </li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        bundles = bundles,
        items = items,
        footer = FOOTER_TEXT
    );

    Html(html)
}
