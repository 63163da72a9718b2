pub mod config;

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

pub type ShutdownWatch = watch::Receiver<bool>;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: crate::api::Config,
    pub topology: TopologyConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopologyConfig {
    /// Seconds between full rebuilds of the topology index; 0 disables them.
    pub resync_interval_secs: u64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: 600,
        }
    }
}

/// A long running task that stops once the shutdown watch fires.
#[async_trait]
pub trait BackgroundService: Send + Sync {
    async fn start(&self, shutdown: ShutdownWatch);
}

pub struct Server {
    services: Vec<(&'static str, Arc<dyn BackgroundService>)>,
    shutdown: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl Server {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            services: Vec::new(),
            shutdown,
            tasks: JoinSet::new(),
        }
    }

    pub fn add_service(&mut self, name: &'static str, service: impl BackgroundService + 'static) {
        self.services.push((name, Arc::new(service)));
    }

    /// Starts every service added so far. Services added afterwards wait for the next call.
    pub fn start(&mut self) {
        for (name, service) in self.services.drain(..) {
            let shutdown = self.shutdown.subscribe();
            info!("Starting {}", name);
            self.tasks.spawn(async move {
                service.start(shutdown).await;
                debug!("{} stopped", name);
            });
        }
    }

    /// Signals every running service to stop and waits for them.
    pub async fn shutdown(mut self) {
        info!("Shutting down background services");
        let _ = self.shutdown.send(true);
        while self.tasks.join_next().await.is_some() {}
    }
}
