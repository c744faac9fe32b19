//! Web server for the dashboard.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::DashboardConfig;
use crate::{Result, TrackerError};

use super::handlers::AppState;
use super::router::create_router;

/// Read-only dashboard server.
pub struct DashboardServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
}

impl DashboardServer {
    /// Create a new dashboard server.
    pub fn new(config: &DashboardConfig, app_state: AppState) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse::<SocketAddr>()
            .map_err(|e| {
                TrackerError::Config(format!(
                    "invalid dashboard address {}:{}: {}",
                    config.host, config.port, e
                ))
            })?;

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the server until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let router = create_router(self.app_state);
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Dashboard listening on http://{}", local_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await?;

        tracing::info!("Dashboard stopped");
        Ok(())
    }

    /// Bind, serve in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self, cancel: CancellationToken) -> Result<SocketAddr> {
        let router = create_router(self.app_state);
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Dashboard listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
            {
                tracing::error!("Dashboard server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
