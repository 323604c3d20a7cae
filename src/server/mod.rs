//! HTTP server components for youdo-api
//!
//! This module provides the HTTP server infrastructure including:
//! - Router configuration and route handlers
//! - Admission, authentication and logging middleware
//! - Server lifecycle management

pub mod middleware;
pub mod response;
pub mod router;

pub use middleware::{auth_middleware, client_key, logging_middleware, rate_limit_middleware};
pub use response::{ApiError, ApiResponse};
pub use router::{build_router, AppState, HealthResponse};

use std::future::Future;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::database::Database;

/// HTTP Server for youdo-api
///
/// Manages the axum server lifecycle, including:
/// - Binding to configured address
/// - Serving with peer address information for rate limiting
/// - Graceful shutdown handling
pub struct Server<D: Database + 'static> {
    config: ServerConfig,
    state: AppState<D>,
}

impl<D: Database + 'static> Server<D> {
    /// Create a new server instance
    pub fn new(config: ServerConfig, state: AppState<D>) -> Self {
        Self { config, state }
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> Result<SocketAddr, ServerError> {
        let ip: IpAddr = self
            .config
            .host
            .parse()
            .map_err(|_| ServerError::Config(format!("invalid host: {}", self.config.host)))?;
        Ok(SocketAddr::new(ip, self.config.port))
    }

    /// Bind the configured address and run until `shutdown` resolves
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        self.serve(listener, shutdown).await
    }

    /// Run on an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let app = build_router(self.state);

        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Server listening on {}", addr);
        }

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// Failed to serve requests
    #[error("Server error: {0}")]
    Serve(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
