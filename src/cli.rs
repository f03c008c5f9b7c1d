//! CLI arguments and subcommands for zaggregator.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;
use zaggregator::KernelBoundary;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "zaggregator",
    about = "Process bundle aggregator for Zabbix and Prometheus",
    long_about = "Process bundle aggregator for Zabbix and Prometheus.\n\n\
                  Collapses the Linux process table into bundles (a service together with \
                  its workers, a daemon with its children, the kernel threads) and exports \
                  per-bundle memory, CPU, context switch and descriptor usage.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Print only the loaded user config file + full path and exit
    #[arg(long)]
    pub show_user_config: bool,

    /// Output format for --show-config*
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Seconds between two scans of the process table
    #[arg(long)]
    pub scan_interval: Option<u64>,

    /// CPU sampling window in milliseconds
    #[arg(long)]
    pub sample_interval_ms: Option<u64>,

    /// Which processes end a family tree: pgid-zero or pgid-zero-or-root
    #[arg(long)]
    pub kernel_boundary: Option<KernelBoundary>,

    /// Accept the legacy metric names (ctxswvol, ctxswinvol, nconn, nfd, nfile)
    #[arg(long)]
    pub compat_metrics: bool,

    /// Disable /health endpoint + health metrics
    #[arg(long)]
    pub disable_health: bool,

    /// Disable internal zaggregator_scan_* metrics
    #[arg(long)]
    pub disable_telemetry: bool,

    /// Parallel processing threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Maximum number of processes to scan
    #[arg(long)]
    pub max_processes: Option<usize>,

    /// Alternative procfs mount point
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Bundles never stored or exported (comma-separated)
    #[arg(long)]
    pub exclude_bundles: Option<String>,

    /// Path to JSON test data file (uses a synthetic process table instead of /proc)
    #[arg(short = 't', long)]
    pub test_data_file: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check {
        /// Check /proc filesystem
        #[arg(long)]
        proc: bool,

        /// Check all system requirements
        #[arg(long)]
        all: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run one or more scans and print the bundle table
    Scan {
        /// Number of scans
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// List the member pids of every bundle
        #[arg(long)]
        verbose: bool,

        /// Only show the N largest bundles by each metric
        #[arg(long, value_name = "N")]
        top: Option<usize>,

        /// Print a structured report instead of the table
        #[arg(long, value_enum)]
        format: Option<ConfigFormat>,
    },

    /// Print the low-level discovery document of one scan
    Discover {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Scan once and print one metric of one bundle
    Get {
        /// Bundle name
        bundle: String,

        /// Metric name (pcpu, memrss, memvms, ctxvol, ctxinvol; legacy names with --compat-metrics)
        metric: String,
    },

    /// Generate a synthetic process table JSON file
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "testdata.json")]
        output: PathBuf,

        /// Number of service trees (each with a master and workers)
        #[arg(long, default_value_t = 8)]
        services: usize,

        /// Number of unrelated single processes
        #[arg(long, default_value_t = 12)]
        extra_processes: usize,
    },

    /// Check runtime requirements and permissions
    CheckRequirements,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_flags() {
        let args = Args::parse_from([
            "zaggregator",
            "--port",
            "10050",
            "--kernel-boundary",
            "pgid-zero",
            "--compat-metrics",
            "--exclude-bundles",
            "kernel,idle",
        ]);
        assert_eq!(args.port, Some(10050));
        assert_eq!(args.kernel_boundary, Some(KernelBoundary::PgidZero));
        assert!(args.compat_metrics);
        assert_eq!(args.exclude_bundles.as_deref(), Some("kernel,idle"));
        assert!(args.command.is_none());
    }

    #[test]
    fn test_parse_get_subcommand() {
        let args = Args::parse_from(["zaggregator", "get", "nginx", "memrss"]);
        match args.command {
            Some(Commands::Get { bundle, metric }) => {
                assert_eq!(bundle, "nginx");
                assert_eq!(metric, "memrss");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
