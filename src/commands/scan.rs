//! Scan command implementation.
//!
//! Runs one or more scans and prints the bundle table or a structured report.

use serde::Serialize;
use std::time::Duration;
use zaggregator::scan::{scan_with, ScanSummary};
use zaggregator::BundleTable;

use crate::cli::ConfigFormat;
use crate::config::Config;
use crate::handlers::bundles::{bundle_views, render_bundle_table, BundleView};

/// Structured result of one scan.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub timestamp: i64,
    pub processes: usize,
    pub vanished: usize,
    pub duration_ms: f64,
    pub idle_percent: f64,
    pub bundles: Vec<BundleView>,
}

impl ScanReport {
    pub fn new(
        table: &BundleTable,
        summary: &ScanSummary,
        top: Option<usize>,
        config: &Config,
    ) -> Self {
        Self {
            timestamp: table.timestamp(),
            processes: summary.processes,
            vanished: summary.vanished,
            duration_ms: summary.duration.as_secs_f64() * 1000.0,
            idle_percent: table.idle_percent(),
            bundles: bundle_views(
                table,
                top.map(|n| (n, config.metric_set())),
                |name| config.is_excluded(name),
            ),
        }
    }

    pub fn render(&self, format: ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
        Ok(match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
        })
    }
}

/// Runs scans and prints their bundles.
pub fn command_scan(
    iterations: usize,
    verbose: bool,
    top: Option<usize>,
    format: Option<ConfigFormat>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = config.process_source()?;
    let scan_config = config.scan_config();
    let boundary = scan_config.boundary;

    if format.is_none() {
        println!("🧪 zaggregator - Scan Mode");
        println!("==========================");
    }

    for iteration in 1..=iterations {
        let (table, summary) = scan_with(source.as_ref(), &scan_config, &boundary)?;
        let report = ScanReport::new(&table, &summary, top, config);

        match format {
            Some(format) => println!("{}", report.render(format)?),
            None => {
                println!("\n🔄 Iteration {}/{}:", iteration, iterations);
                println!(
                    "   ⏱️  Scan duration: {:.2}ms (sampling {}ms)",
                    report.duration_ms,
                    scan_config.sample_interval.as_millis()
                );
                println!("   📊 Processes: {}", summary.processes);
                println!("   👻 Vanished: {}", summary.vanished);
                println!();
                print!(
                    "{}",
                    render_bundle_table(&report.bundles, report.idle_percent, verbose)
                );
            }
        }

        if iteration < iterations {
            // the sampling window already spaced the reads; keep scans apart as well
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    if format.is_none() {
        println!("\n✅ Scan completed successfully");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{fixture_source, test_config};

    #[test]
    fn test_report_renders_all_formats() {
        let config = test_config();
        let source = fixture_source();
        let scan_config = config.scan_config();
        let (table, summary) =
            scan_with(source.as_ref(), &scan_config, &scan_config.boundary).expect("scan");
        let report = ScanReport::new(&table, &summary, None, &config);

        assert_eq!(report.processes, 5);
        assert_eq!(report.bundles.len(), 3);

        let json = report.render(ConfigFormat::Json).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(value["bundles"][0]["name"], "cron");
        assert_eq!(value["bundles"][0]["rss"], 4096);

        let yaml = report.render(ConfigFormat::Yaml).expect("yaml");
        assert!(yaml.contains("nginx:daemon"));
    }

    #[test]
    fn test_report_top_bundles() {
        let config = test_config();
        let source = fixture_source();
        let scan_config = config.scan_config();
        let (table, summary) =
            scan_with(source.as_ref(), &scan_config, &scan_config.boundary).expect("scan");

        let report = ScanReport::new(&table, &summary, Some(0), &config);
        assert!(report.bundles.is_empty());

        let report = ScanReport::new(&table, &summary, Some(1), &config);
        assert_eq!(report.bundles[0].name, "cron");
    }
}
