//! Bundle table endpoint handler.
//!
//! `/bundles` lists every bundle of the last scan with its aggregates and
//! members as plain text, or as JSON with `?format=json`. `?top=N` keeps
//! only the N largest bundles by each metric.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};
use zaggregator::bundle::{BundleStats, MetricSet, ProcBundle};
use zaggregator::BundleTable;

use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct BundlesQuery {
    pub format: Option<String>,
    pub top: Option<usize>,
}

/// One bundle as shown by `/bundles` and the `scan` command.
#[derive(Debug, Clone, Serialize)]
pub struct BundleView {
    pub name: String,
    pub leader: u32,
    pub members: Vec<u32>,
    #[serde(flatten)]
    pub stats: BundleStats,
}

/// Bundles sorted by resident memory, largest first. With `top`, only the
/// union of the largest bundles by each metric of the set is kept.
pub fn bundle_views<F>(
    table: &BundleTable,
    top: Option<(usize, MetricSet)>,
    excluded: F,
) -> Vec<BundleView>
where
    F: Fn(&str) -> bool,
{
    let selected: Vec<&ProcBundle> = match top {
        Some((n, set)) => table.top(n, set),
        None => table.bundles().iter().collect(),
    };
    let mut views: Vec<BundleView> = selected
        .into_iter()
        .filter(|b| !excluded(&b.name))
        .map(|b| BundleView {
            name: b.name.clone(),
            leader: b.leader,
            members: b.members.clone(),
            stats: table.aggregate(b),
        })
        .collect();
    views.sort_by(|a, b| b.stats.rss.cmp(&a.stats.rss).then_with(|| a.name.cmp(&b.name)));
    views
}

/// Plain-text table of bundle views.
pub fn render_bundle_table(views: &[BundleView], idle_percent: f64, verbose: bool) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{:24} {:>6} {:>12} {:>12} {:>8} {:>6} {:>6} {:>6}",
        "BUNDLE", "PROCS", "RSS (KB)", "VMS (KB)", "CPU %", "FDS", "FILES", "SOCKS"
    )
    .ok();
    writeln!(out, "{}", "-".repeat(89)).ok();
    for v in views {
        writeln!(
            out,
            "{:24} {:>6} {:>12} {:>12} {:>8.1} {:>6} {:>6} {:>6}",
            v.name,
            v.stats.members,
            v.stats.rss / 1024,
            v.stats.vms / 1024,
            v.stats.pcpu,
            v.stats.n_fds,
            v.stats.n_open_files,
            v.stats.n_sockets
        )
        .ok();
        if verbose {
            let pids: Vec<String> = v.members.iter().map(|p| p.to_string()).collect();
            writeln!(out, "    leader {} members [{}]", v.leader, pids.join(", ")).ok();
        }
    }
    writeln!(out).ok();
    writeln!(out, "{} bundles, host idle {:.1}%", views.len(), idle_percent).ok();
    out
}

/// Handler for the /bundles endpoint.
#[instrument(skip(state))]
pub async fn bundles_handler(
    State(state): State<SharedState>,
    Query(query): Query<BundlesQuery>,
) -> Response {
    debug!("Processing /bundles request");
    state.health_stats.record_http_request();

    let table = state.cache.read().await.table.clone();
    let Some(table) = table else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "No scan has finished yet\n",
        )
            .into_response();
    };

    let top = query.top.map(|n| (n, state.config.metric_set()));
    let views = bundle_views(&table, top, |name| state.config.is_excluded(name));

    if query.format.as_deref() == Some("json") {
        return Json(views).into_response();
    }

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        render_bundle_table(&views, table.idle_percent(), true),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan_updater::update_cache;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn test_bundle_views_sorted_by_rss() {
        let state = test_state();
        update_cache(&state).await.expect("scan");
        let table = state.cache.read().await.table.clone().expect("table");

        let views = bundle_views(&table, None, |_| false);
        let names: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["cron", "nginx:daemon", "kernel"]);
        assert_eq!(views[1].members, vec![100, 101]);

        let filtered = bundle_views(&table, None, |name| name == "kernel");
        assert_eq!(filtered.len(), 2);
    }

    #[tokio::test]
    async fn test_bundle_views_top() {
        let state = test_state();
        update_cache(&state).await.expect("scan");
        let table = state.cache.read().await.table.clone().expect("table");

        let all = bundle_views(&table, Some((10, MetricSet::Standard)), |_| false);
        assert_eq!(all.len(), 3);

        let top = bundle_views(&table, Some((1, MetricSet::Standard)), |_| false);
        assert!(!top.is_empty());
        assert!(top.len() <= MetricSet::Standard.names().len());
        assert_eq!(top[0].name, "cron");
    }

    #[tokio::test]
    async fn test_render_bundle_table() {
        let state = test_state();
        update_cache(&state).await.expect("scan");
        let table = state.cache.read().await.table.clone().expect("table");

        let out = render_bundle_table(&bundle_views(&table, None, |_| false), table.idle_percent(), true);
        assert!(out.starts_with("BUNDLE"));
        assert!(out.contains("leader 100 members [100, 101]"));
        assert!(out.contains("3 bundles, host idle 87.5%"));
    }
}
