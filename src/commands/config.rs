//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("zaggregator.yaml"),
    };

    let mut content = render_config(&config, format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# zaggregator Configuration
# ==========================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                   # HTTP port
#
# Scanning
# --------
# scan_interval_seconds: 5     # Seconds between two scans
# sample_interval_ms: 1000     # CPU sampling window inside a scan
# kernel_boundary: pgid-zero-or-root  # or pgid-zero (init then leads its own tree)
# parallelism: null            # Parallel threads for reading /proc (null = auto)
# max_processes: null          # Maximum processes to scan
# proc_root: "/proc"           # procfs mount point
# test_data_file: null         # Replay a JSON process table instead of /proc
#
# Export
# ------
# compat_metrics: false        # Accept nconn/nfd/nfile/ctxswvol/ctxswinvol
# exclude_bundles: null        # Bundles never stored or exported (e.g. ["kernel"])
#
# Feature Flags
# -------------
# enable_health: true          # Enable /health endpoint
# enable_telemetry: true       # Enable zaggregator_scan_* metrics
# log_level: "info"            # off, error, warn, info, debug, trace
#
# Sample Store Retention
# ----------------------
# retention:
#   max_memory_mb: 4           # Memory budget for all bundle histories
#   expected_bundles: 64       # Bundles the budget is divided across
#   min_entries_per_bundle: 10
#   max_entries_per_bundle: 300
#   max_sample_age_seconds: 30 # Older samples answer 0.0 and leave discovery
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_written_and_reloadable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zaggregator.yaml");
        command_config(Some(path.clone()), ConfigFormat::Yaml, true).expect("write");

        let content = fs::read_to_string(&path).expect("read");
        assert!(content.starts_with("# zaggregator Configuration"));

        let loaded = crate::config::load_config(Some(&path)).expect("load");
        assert_eq!(loaded.scan_interval_seconds, Some(5));
        assert_eq!(loaded.retention.max_entries_per_bundle, 300);
    }

    #[test]
    fn test_toml_and_json_formats() {
        let dir = tempfile::tempdir().expect("tempdir");
        for (file, format) in [("z.toml", ConfigFormat::Toml), ("z.json", ConfigFormat::Json)] {
            let path = dir.path().join(file);
            command_config(Some(path.clone()), format, false).expect("write");
            let loaded = crate::config::load_config(Some(&path)).expect("load");
            assert_eq!(loaded.port, Some(crate::config::DEFAULT_PORT));
        }
    }
}
