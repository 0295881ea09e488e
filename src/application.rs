//! Application assembly and lifecycle
//!
//! Loads settings, wires the proxy service, and serves the router. Kept
//! separate from `main` so integration tests can assemble the same stack
//! against test configuration.

use crate::config::Settings;
use crate::error::Result;
use crate::proxy::ProxyService;
use axum::Router;
use tracing::info;

pub struct Application {
    settings: Settings,
    router: Router,
}

impl Application {
    /// Assemble the gateway from environment-driven settings
    pub fn new() -> Result<Self> {
        let settings = Settings::new()?;
        Self::with_settings(settings)
    }

    pub fn with_settings(settings: Settings) -> Result<Self> {
        let router = ProxyService::from_settings(&settings)?.into_router();
        Ok(Self { settings, router })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(self) -> Result<()> {
        let address = format!(
            "{}:{}",
            self.settings.application.host, self.settings.application.port
        );
        let listener = tokio::net::TcpListener::bind(&address).await?;
        info!(
            address,
            upstream = %self.settings.upstream.base_url,
            compression = self.settings.compression.enabled,
            "gateway listening"
        );
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
