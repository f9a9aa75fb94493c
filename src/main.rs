//! Main entry point for the Cloak Room chat matchmaking service
//!
//! Initializes configuration, logging, the shared application state and
//! the HTTP/WebSocket server, then waits for a shutdown signal and tears
//! everything down gracefully.

use anyhow::Result;
use clap::Parser;
use cloak_room::config::{AppConfig, QueueBackendKind};
use cloak_room::service::{build_router, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Cloak Room - Anonymous one-on-one chat matchmaking
#[derive(Parser)]
#[command(
    name = "cloak-room",
    version,
    about = "Anonymous one-on-one chat matchmaking with gender-preference queues",
    long_about = "Cloak Room pairs verified participants through gender-preference FIFO \
                 queues, relays chat messages between matched partners over WebSocket, and \
                 enforces queueing policy such as cooldowns and daily filter quotas."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Server port override
    #[arg(short, long, value_name = "PORT", help = "Override server port")]
    port: Option<u16>,

    /// Queue backend override
    #[arg(
        long,
        value_name = "BACKEND",
        help = "Override queue backend (memory, expiring)"
    )]
    queue_backend: Option<String>,

    /// Perform health check and exit
    #[arg(long, help = "Initialize components, print stats and exit")]
    health_check: bool,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Initialize components, print current stats and exit
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config)?;
    match app_state.store.stats().await {
        Ok(stats) => {
            println!("Health Check: healthy");
            println!("  Instance: {}", app_state.instance_id());
            println!(
                "  Queue depth: male={} female={} other={}",
                stats.male, stats.female, stats.other
            );
            println!(
                "  Active connections: {}",
                app_state.registry.connection_count().unwrap_or(0)
            );
            Ok(())
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Cloak Room Chat Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Listening on: {}:{}",
        config.server.host, config.server.port
    );
    info!("   Queue backend: {:?}", config.server.queue_backend);
    info!(
        "   Queue cooldown: {}s",
        config.policy.queue_cooldown_seconds
    );
    info!(
        "   Daily specific-filter limit: {}",
        config.policy.daily_specific_filter_limit
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Some(backend) = &args.queue_backend {
        config.server.queue_backend = match backend.to_lowercase().as_str() {
            "memory" => QueueBackendKind::Memory,
            "expiring" => QueueBackendKind::Expiring,
            _ => anyhow::bail!("Invalid queue backend: {}", backend),
        };
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let app_state = match AppState::new(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    let app_state = Arc::new(app_state);
    let router = build_router(Arc::clone(&app_state));

    let server = {
        let mut shutdown_rx = app_state.shutdown_signal();
        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        })
    };

    info!("Cloak Room is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    app_state.stop().await;

    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(_) => info!("Graceful shutdown completed successfully"),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }
    app_state.join_background_tasks().await;

    info!("Cloak Room Chat Matchmaking Service stopped");
    Ok(())
}
