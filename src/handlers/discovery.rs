//! Low-level discovery endpoint handler.
//!
//! `/discovery` lists the bundles holding a sample not older than the
//! store's max sample age, plus the idle pseudo-bundle.

use axum::{extract::State, Json};
use serde_json::Value;
use tracing::{debug, instrument};
use zaggregator::discovery::discovery_document;

use crate::state::SharedState;

/// Handler for the /discovery endpoint.
#[instrument(skip(state))]
pub async fn discovery_handler(State(state): State<SharedState>) -> Json<Value> {
    debug!("Processing /discovery request");
    state.health_stats.record_http_request();

    let names = state.store.bundle_names();
    debug!("Discovery lists {} fresh bundles", names.len());
    Json(discovery_document(&names))
}
