//! Metrics server: binds the configured address and serves the HTTP surface
//! over a shared metric store until cancelled.

pub mod dashboard;
pub mod http;
pub mod path;

use crate::core::{PulseError, Result, ServerConfig};
use crate::metrics::{MemStorage, MetricsBackend};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use http::create_router;

/// Server owning the store and the HTTP surface.
pub struct MetricsServer {
    config: ServerConfig,
    storage: Arc<dyn MetricsBackend>,
}

impl MetricsServer {
    /// Create a server over any storage backend.
    pub fn new(config: ServerConfig, storage: Arc<dyn MetricsBackend>) -> Self {
        Self { config, storage }
    }

    /// Create a server over a fresh in-memory store.
    pub fn with_memory_storage(config: ServerConfig) -> Self {
        Self::new(config, Arc::new(MemStorage::new()))
    }

    /// Router serving the metric endpoints.
    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.storage))
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener> {
        let address = &self.config.address;
        TcpListener::bind((address.host(), address.port()))
            .await
            .map_err(|e| PulseError::network(format!("Failed to bind to {address}: {e}")))
    }

    /// Serve on `listener` until `cancel` fires, then stop accepting and let
    /// in-flight requests finish.
    pub async fn serve(&self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| PulseError::network(format!("HTTP server error: {e}")))
    }

    /// Bind, serve and drain within `shutdown_timeout` once cancelled.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        let local: SocketAddr = listener.local_addr()?;
        tracing::info!(address = %local, "pulse server listening");

        let shutdown_timeout = self.config.shutdown_timeout;
        let mut handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { self.serve(listener, cancel).await })
        };

        tokio::select! {
            result = &mut handle => {
                return result?;
            }
            () = cancel.cancelled() => {
                tracing::info!("shutdown requested, draining in-flight requests");
            }
        }

        match tokio::time::timeout(shutdown_timeout, &mut handle).await {
            Ok(result) => {
                result??;
                tracing::info!("pulse server stopped");
            },
            Err(_) => {
                tracing::info!(
                    timeout = ?shutdown_timeout,
                    "graceful shutdown timed out, closing remaining connections"
                );
                handle.abort();
            },
        }

        Ok(())
    }
}
