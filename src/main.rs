//! zaggregator - version 0.1.0
//!
//! Process bundle aggregator with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cache;
mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod scan_updater;
mod startup_checks;
mod state;

use axum::{routing::get, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{
    command_check, command_config, command_discover, command_generate_testdata, command_get,
    command_scan,
};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT, DEFAULT_PROC_ROOT,
};
use handlers::{
    bundles_handler, config_handler, discovery_handler, health_handler, metrics_handler,
    query_handler, root_handler,
};
use state::AppState;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

fn proc_root(config: &Config) -> PathBuf {
    config
        .proc_root
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
}

/// Configure parallel /proc reading
fn configure_parallelism(config: &Config) {
    if let Some(threads) = config.parallelism {
        if threads > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
            {
                Ok(()) => debug!("Rayon thread pool configured with {} threads", threads),
                Err(e) => error!("Failed to set rayon thread pool: {}", e),
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.show_user_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        if args.show_config {
            return show_config(&config, args.config_format, false);
        }

        if args.show_user_config {
            return show_config(&config, args.config_format, true);
        }
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        match command {
            Commands::Config {
                output,
                format,
                commented,
            } => {
                return command_config(output.clone(), *format, *commented);
            }
            Commands::GenerateTestdata {
                output,
                services,
                extra_processes,
            } => {
                return command_generate_testdata(output.clone(), *services, *extra_processes);
            }
            Commands::CheckRequirements => {
                println!("🔍 Checking Runtime Requirements");
                println!("================================\n");

                setup_logging(&args);
                let config = resolve_config(&args)?;
                match startup_checks::validate_requirements(&proc_root(&config)) {
                    Ok(_) => {
                        println!("\n✅ All requirements met - ready for production!");
                        std::process::exit(0);
                    }
                    Err(e) => {
                        eprintln!("\n❌ Requirements check failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            _ => {
                // Other commands need config validation
            }
        }

        let config = load_validated_config(&args)?;
        configure_parallelism(&config);

        return match command {
            Commands::Check { proc, all } => command_check(*proc, *all, &config),
            Commands::Scan {
                iterations,
                verbose,
                top,
                format,
            } => command_scan(*iterations, *verbose, *top, *format, &config),
            Commands::Discover { pretty } => command_discover(*pretty, &config),
            Commands::Get { bundle, metric } => command_get(bundle, metric, &config),
            Commands::Config { .. }
            | Commands::GenerateTestdata { .. }
            | Commands::CheckRequirements => Ok(()),
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&args);

    info!("Starting zaggregator");

    if config.test_data_file.is_none() {
        if let Err(e) = startup_checks::validate_requirements(&proc_root(&config)) {
            error!("❌ Startup validation failed: {}", e);
            error!("   The aggregator will start but bundles may be incomplete!");
        }
    }

    let bind_ip_str = config.bind.clone().unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);

    configure_parallelism(&config);

    let source = config.process_source()?;
    let state = AppState::new(config.clone(), source)?;
    debug!("All metrics registered successfully");

    // Perform initial scan so the first scrape has data
    info!("Performing initial scan");
    if let Err(e) = scan_updater::update_cache(&state).await {
        error!("Initial scan failed: {}", e);
    } else {
        info!("Initial scan completed successfully");
    }

    let scan_task = scan_updater::spawn_scan_loop(state.clone());

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app
        .route("/config", get(config_handler))
        .route("/bundles", get(bundles_handler))
        .route("/discovery", get(discovery_handler))
        .route("/bundle/{name}/{check}", get(query_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!("zaggregator listening on http://{}:{}", bind_ip_str, port);

    let server = axum::serve(listener, app);

    let result = tokio::select! {
        result = server => result,
        _ = shutdown_signal() => {
            info!("Shutdown signal received, exiting...");
            Ok(())
        }
    };

    scan_task.abort();
    state.store.close();

    if let Err(e) = result {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("zaggregator stopped gracefully");
    Ok(())
}
