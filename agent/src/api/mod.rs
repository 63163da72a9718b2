mod handlers;
mod router;
mod schemas;

use crate::network::SharedNetwork;
use crate::server::{BackgroundService, ShutdownWatch};
use crate::topology::SharedIndex;
use anyhow::anyhow;
use async_trait::async_trait;
use log::{debug, error, info};
use serde::Deserialize;
use tokio::net::TcpListener;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self { port: 8090 }
    }
}

/// Shared by every handler.
#[derive(Clone)]
pub struct State {
    pub index: SharedIndex,
    pub network: SharedNetwork,
}

pub struct Service {
    port: u16,
    state: State,
}

impl Service {
    pub fn new(port: u16, state: State) -> Self {
        Self { port, state }
    }

    pub async fn run(&self, mut shutdown: ShutdownWatch) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .map_err(|e| anyhow!("error creating listener: {}", e))?;
        let addr = listener
            .local_addr()
            .map_err(|e| anyhow!("error reading listener address: {}", e))?;
        info!("API server listening on {}", addr);

        let app = router::new(self.state.clone());
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if let Err(e) = shutdown.changed().await {
                    debug!("Error while waiting for API shutdown signal: {}", e);
                }
                info!("Shutting down API server");
            })
            .await
            .map_err(|e| anyhow!("error running API server: {}", e))
    }
}

#[async_trait]
impl BackgroundService for Service {
    async fn start(&self, shutdown: ShutdownWatch) {
        if let Err(e) = self.run(shutdown).await {
            error!("Error running API web service: {}", e);
        }
    }
}
