//! Single-value bundle query handler.
//!
//! `/bundle/{name}/{check}` answers with the newest sample of one metric as
//! plain text. Unknown bundles, unknown metrics and samples older than the
//! max sample age all answer with the `0.0` sentinel and status 200, so a
//! monitoring agent never sees an error for a bundle that went away.

use axum::extract::{Path, State};
use tracing::{debug, instrument};
use zaggregator::bundle::{Metric, SENTINEL};

use crate::state::SharedState;

/// Handler for the /bundle/{name}/{check} endpoint.
#[instrument(skip(state))]
pub async fn query_handler(
    State(state): State<SharedState>,
    Path((name, check)): Path<(String, String)>,
) -> String {
    state.health_stats.record_http_request();

    let value = Metric::parse(&check, state.config.metric_set())
        .and_then(|metric| state.store.latest(&name, metric));

    state.health_stats.record_query(value.is_none());
    match value {
        Some(v) => v.to_string(),
        None => {
            debug!("No fresh value for {}/{}, answering sentinel", name, check);
            SENTINEL.to_string()
        }
    }
}
