//! CLI command implementations for zaggregator.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `scan`: One-shot scans printed as a table or report
//! - `discover`: One-shot discovery document
//! - `get`: One-shot single-value query
//! - `generate`: Synthetic process table generation

pub mod check;
pub mod config;
pub mod discover;
pub mod generate;
pub mod get;
pub mod scan;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use discover::command_discover;
pub use generate::command_generate_testdata;
pub use get::command_get;
pub use scan::command_scan;
