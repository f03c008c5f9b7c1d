//! Check command implementation.
//!
//! Validates system requirements and configuration.

use zaggregator::process::ProcessSource;
use zaggregator::scan::scan_with;

use crate::config::{validate_effective_config, Config};

/// Validates system requirements and configuration.
pub fn command_check(proc: bool, all: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 zaggregator - System Check");
    println!("=============================");

    let mut all_ok = true;

    // Check the process table
    if proc || all {
        println!("\n📁 Checking process source...");
        match config.process_source() {
            Ok(source) => match source.pids() {
                Ok(pids) if pids.is_empty() => {
                    println!("   ❌ Process source lists no processes");
                    all_ok = false;
                }
                Ok(pids) => {
                    println!("   ✅ Can list {} processes", pids.len());
                    let readable = pids
                        .iter()
                        .take(5)
                        .filter(|&&pid| source.read_process(pid).is_ok())
                        .count();
                    println!("   ✅ Read {}/{} sample processes", readable, pids.len().min(5));
                }
                Err(e) => {
                    println!("   ❌ Cannot list processes: {}", e);
                    all_ok = false;
                }
            },
            Err(e) => {
                println!("   ❌ Cannot open process source: {}", e);
                all_ok = false;
            }
        }

        if all_ok {
            println!("\n📦 Running one scan...");
            let check_config = zaggregator::ScanConfig {
                sample_interval: std::time::Duration::ZERO,
                ..config.scan_config()
            };
            let result = config
                .process_source()
                .map_err(|e| e.to_string())
                .and_then(|source| {
                    scan_with(source.as_ref(), &check_config, &check_config.boundary)
                        .map_err(|e| e.to_string())
                });
            match result {
                Ok((table, summary)) => {
                    println!(
                        "   ✅ {} processes in {} bundles ({:.2}ms)",
                        summary.processes,
                        table.len(),
                        summary.duration.as_secs_f64() * 1000.0
                    );
                }
                Err(e) => {
                    println!("   ❌ Scan failed: {}", e);
                    all_ok = false;
                }
            }
        }
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
            println!(
                "   ✅ Kernel boundary: {}",
                config.kernel_boundary.unwrap_or_default()
            );
            println!("   ✅ Metric names: {}", config.metric_set().names().join(", "));
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
