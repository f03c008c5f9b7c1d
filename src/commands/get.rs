//! Get command implementation.
//!
//! Scans once and prints one metric of one bundle. Unknown bundles and
//! metrics, as well as a failed scan, print the `0.0` sentinel and still
//! exit successfully.

use tracing::warn;
use zaggregator::bundle::SENTINEL;
use zaggregator::scan::scan_with;

use crate::config::Config;

/// Value printed by `get`.
pub fn query_once(bundle: &str, metric: &str, config: &Config) -> String {
    if config.is_excluded(bundle) {
        return SENTINEL.to_string();
    }
    let source = match config.process_source() {
        Ok(source) => source,
        Err(e) => {
            warn!("No process source for {}/{}: {}", bundle, metric, e);
            return SENTINEL.to_string();
        }
    };
    let scan_config = config.scan_config();
    match scan_with(source.as_ref(), &scan_config, &scan_config.boundary) {
        Ok((table, _)) => table.query(bundle, metric, config.metric_set()),
        Err(e) => {
            warn!("Scan for {}/{} failed: {}", bundle, metric, e);
            SENTINEL.to_string()
        }
    }
}

pub fn command_get(bundle: &str, metric: &str, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", query_once(bundle, metric, config));
    Ok(())
}
