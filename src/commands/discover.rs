//! Discover command implementation.
//!
//! Scans once and prints the low-level discovery document.

use zaggregator::discovery::{discovery_document, discovery_json};
use zaggregator::scan::scan_with;

use crate::config::Config;

pub fn command_discover(pretty: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let source = config.process_source()?;
    let scan_config = config.scan_config();
    let (table, _) = scan_with(source.as_ref(), &scan_config, &scan_config.boundary)?;

    let mut names: Vec<&str> = table
        .names()
        .into_iter()
        .filter(|n| !config.is_excluded(n))
        .collect();
    names.sort_unstable();

    if pretty {
        println!("{}", serde_json::to_string_pretty(&discovery_document(&names))?);
    } else {
        println!("{}", discovery_json(&names));
    }
    Ok(())
}
