//! Configuration management for zaggregator.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use zaggregator::bundle::MetricSet;
use zaggregator::process::{CaptureOptions, FixtureSource, ProcFs, ProcessSource};
use zaggregator::{KernelBoundary, RetentionConfig, ScanConfig, ScanError};

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_SCAN_INTERVAL: u64 = 5;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Scanning
    #[serde(alias = "scan-interval-seconds")]
    pub scan_interval_seconds: Option<u64>,
    #[serde(alias = "sample-interval-ms")]
    pub sample_interval_ms: Option<u64>,
    #[serde(alias = "kernel-boundary")]
    pub kernel_boundary: Option<KernelBoundary>,
    pub parallelism: Option<usize>,
    pub max_processes: Option<usize>,
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,

    // Export
    #[serde(alias = "compat-metrics")]
    pub compat_metrics: Option<bool>,
    #[serde(alias = "exclude-bundles")]
    pub exclude_bundles: Option<Vec<String>>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    /// Path to JSON test data file (uses a synthetic process table instead of /proc)
    #[serde(alias = "test-data-file")]
    pub test_data_file: Option<PathBuf>,

    // Sample store retention
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            scan_interval_seconds: Some(DEFAULT_SCAN_INTERVAL),
            sample_interval_ms: Some(DEFAULT_SAMPLE_INTERVAL_MS),
            kernel_boundary: Some(KernelBoundary::default()),
            parallelism: None,
            max_processes: None,
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            compat_metrics: Some(false),
            exclude_bundles: None,
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some("info".into()),
            test_data_file: None,
            retention: RetentionConfig::default(),
        }
    }
}

impl Config {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds.unwrap_or(DEFAULT_SCAN_INTERVAL))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.unwrap_or(DEFAULT_SAMPLE_INTERVAL_MS))
    }

    /// Scan parameters for the library.
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            sample_interval: self.sample_interval(),
            boundary: self.kernel_boundary.unwrap_or_default(),
            capture: CaptureOptions {
                max_processes: self.max_processes,
                parallel: self.parallelism != Some(1),
            },
        }
    }

    pub fn metric_set(&self) -> MetricSet {
        if self.compat_metrics.unwrap_or(false) {
            MetricSet::Compat
        } else {
            MetricSet::Standard
        }
    }

    pub fn is_excluded(&self, bundle: &str) -> bool {
        self.exclude_bundles
            .as_ref()
            .is_some_and(|names| names.iter().any(|n| n == bundle))
    }

    /// The process table to read: a fixture file when configured, procfs otherwise.
    pub fn process_source(&self) -> Result<Arc<dyn ProcessSource>, ScanError> {
        match &self.test_data_file {
            Some(path) => {
                info!("Using test data file: {}", path.display());
                Ok(Arc::new(FixtureSource::from_file(path)?))
            }
            None => {
                let root = self
                    .proc_root
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT));
                Ok(Arc::new(ProcFs::new(root)))
            }
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.scan_interval_seconds == Some(0) {
        return Err("scan_interval_seconds must be at least 1".into());
    }

    // The sampling window has to fit inside one scan interval
    let sample = cfg.sample_interval();
    let scan = cfg.scan_interval();
    if sample >= scan {
        return Err(format!(
            "sample_interval_ms ({}ms) must be shorter than scan_interval_seconds ({}s)",
            sample.as_millis(),
            scan.as_secs()
        )
        .into());
    }

    if cfg.max_processes == Some(0) {
        return Err("max_processes must be greater than 0 when set".into());
    }

    let retention = &cfg.retention;
    if retention.max_memory_mb == 0 {
        return Err("retention.max_memory_mb must be greater than 0".into());
    }
    if retention.min_entries_per_bundle == 0 {
        return Err("retention.min_entries_per_bundle must be greater than 0".into());
    }
    if retention.min_entries_per_bundle > retention.max_entries_per_bundle {
        return Err(format!(
            "retention.min_entries_per_bundle ({}) exceeds max_entries_per_bundle ({})",
            retention.min_entries_per_bundle, retention.max_entries_per_bundle
        )
        .into());
    }

    if let Some(path) = &cfg.test_data_file {
        if !path.exists() {
            return Err(format!("test data file not found: {}", path.display()).into());
        }
    } else if let Some(root) = &cfg.proc_root {
        if !root.is_dir() {
            return Err(format!("proc_root is not a directory: {}", root.display()).into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !matches!(level, "off" | "error" | "warn" | "info" | "debug" | "trace") {
            return Err(format!(
                "Invalid log_level '{}', expected off, error, warn, info, debug or trace",
                level
            )
            .into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }

    // Only override port if the user supplied it on the CLI.
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }

    if let Some(secs) = args.scan_interval {
        config.scan_interval_seconds = Some(secs);
    }
    if let Some(ms) = args.sample_interval_ms {
        config.sample_interval_ms = Some(ms);
    }
    if let Some(boundary) = args.kernel_boundary {
        config.kernel_boundary = Some(boundary);
    }
    if args.parallelism.is_some() {
        config.parallelism = args.parallelism;
    }
    if args.max_processes.is_some() {
        config.max_processes = args.max_processes;
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }

    if args.compat_metrics {
        config.compat_metrics = Some(true);
    }

    // Parse comma-separated bundle names
    if let Some(exclude_str) = &args.exclude_bundles {
        config.exclude_bundles = Some(
            exclude_str
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    // Test data file: CLI wins if provided
    if let Some(test_file) = &args.test_data_file {
        config.test_data_file = Some(test_file.clone());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/zaggregator/zaggregator.yaml",
            "/etc/zaggregator/zaggregator.yml",
            "/etc/zaggregator/zaggregator.json",
            "./zaggregator.yaml",
            "./zaggregator.yml",
            "./zaggregator.json",
        ];

        match defaults.iter().find(|p| Path::new(p).exists()) {
            Some(found) => PathBuf::from(found),
            None => return Ok(Config::default()),
        }
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;
    parse_config(&content, &path)
}

fn parse_config(content: &str, path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(
    config: &Config,
    format: ConfigFormat,
    user_config: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = render_config(config, format)?;

    if user_config {
        println!("User configuration (effective values):");
    }
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_effective_config(&config).is_ok());
        assert_eq!(config.scan_interval(), Duration::from_secs(5));
        assert_eq!(config.metric_set(), MetricSet::Standard);
    }

    #[test]
    fn test_sample_interval_must_fit_scan_interval() {
        let config = Config {
            scan_interval_seconds: Some(1),
            sample_interval_ms: Some(1500),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_retention_bounds_validated() {
        let mut config = Config::default();
        config.retention.min_entries_per_bundle = 500;
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_yaml_file_then_cli_precedence() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("tempfile");
        writeln!(
            file,
            "port: 10050\nkernel_boundary: pgid-zero\ncompat_metrics: true\nretention:\n  max_sample_age_seconds: 60"
        )
        .expect("write");

        let path = file.path().to_string_lossy().to_string();
        let args = Args::parse_from(["zaggregator", "-c", &path, "--port", "9999"]);
        let config = resolve_config(&args).expect("resolve");

        assert_eq!(config.port, Some(9999));
        assert_eq!(config.kernel_boundary, Some(KernelBoundary::PgidZero));
        assert_eq!(config.metric_set(), MetricSet::Compat);
        assert_eq!(config.retention.max_sample_age_seconds, 60);
        // untouched retention keys fall back to their defaults
        assert_eq!(config.retention.max_entries_per_bundle, 300);
    }

    #[test]
    fn test_exclude_bundles_parsed_from_cli() {
        let args = Args::parse_from([
            "zaggregator",
            "--no-config",
            "--exclude-bundles",
            "kernel, idle,",
        ]);
        let config = resolve_config(&args).expect("resolve");
        assert!(config.is_excluded("kernel"));
        assert!(config.is_excluded("idle"));
        assert!(!config.is_excluded("nginx"));
    }

    #[test]
    fn test_json_config_parsed_by_extension() {
        let config = parse_config(
            r#"{"scan_interval_seconds": 10, "exclude_bundles": ["kernel"]}"#,
            Path::new("zaggregator.json"),
        )
        .expect("parse");
        assert_eq!(config.scan_interval_seconds, Some(10));
        assert!(config.is_excluded("kernel"));
        assert_eq!(config.port, None);
    }
}
