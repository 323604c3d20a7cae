//! youdo-api - A to-do list API
//!
//! This is the main entry point for the youdo-api application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use youdo_api::auth::{
    spawn_sweeper, AdmissionController, AuthService, CredentialHasher, RateLimitConfig,
    TokenService,
};
use youdo_api::config::Config;
use youdo_api::database::SqliteDatabase;
use youdo_api::logging::init_tracing;
use youdo_api::server::{AppState, Server};
use youdo_api::tasks::TaskService;

/// youdo-api - A to-do list API
#[derive(Parser, Debug)]
#[command(name = "youdo-api")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "YOUDO_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting youdo-api");

    let database = Arc::new(SqliteDatabase::new(&config.database.path).await?);
    info!(path = %config.database.path, "Database initialized");

    let hasher = CredentialHasher::from_config(&config.password)?;
    let tokens = TokenService::new(config.auth.jwt_secret.clone(), config.auth.token_ttl());
    let auth_service = Arc::new(AuthService::new(Arc::clone(&database), hasher, tokens));
    let task_service = Arc::new(TaskService::new(database));

    let rate_limit = RateLimitConfig::from(&config.rate_limit);
    info!(
        requests = rate_limit.requests,
        window_secs = rate_limit.window.as_secs(),
        idle_timeout_secs = rate_limit.idle_timeout.as_secs(),
        "Rate limiter initialized"
    );
    let admission = Arc::new(AdmissionController::new(rate_limit));
    let sweeper = spawn_sweeper(&admission);

    let state = AppState {
        auth_service,
        task_service,
        admission,
        trust_forwarded_for: config.server.trust_forwarded_for,
        cors: config.cors.clone(),
    };

    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown_signal()).await;

    sweeper.shutdown().await;

    if let Err(e) = &result {
        error!(error = %e, "Server terminated with an error");
    }
    info!("youdo-api shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
