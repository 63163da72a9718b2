use crate::k8s::cache::ClusterCache;
use crate::network::SharedNetwork;
use crate::server::{BackgroundService, ShutdownWatch};
use crate::topology::SharedIndex;
use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;
use tokio::select;
use tokio::time::{self, Duration, MissedTickBehavior};

/// Periodically rebuilds the topology index and the network cache from the reflector stores.
///
/// Watch streams only deliver changes, so an event dropped by the index (an owner chain that
/// could not be resolved yet, say) would otherwise never be looked at again.
pub struct Resync {
    index: SharedIndex,
    network: SharedNetwork,
    cache: ClusterCache,
    interval: Duration,
}

impl Resync {
    pub fn new(
        index: SharedIndex,
        network: SharedNetwork,
        cache: ClusterCache,
        interval: Duration,
    ) -> Self {
        Self {
            index,
            network,
            cache,
            interval,
        }
    }

    fn run_once(&self) {
        self.index.write().rebuild();

        let nodes = self.cache.nodes.state();
        let pods = self.cache.pods.state();
        let services = self.cache.services.state();
        self.network.write().rebuild(
            nodes.iter().map(Arc::as_ref),
            pods.iter().map(Arc::as_ref),
            services.iter().map(Arc::as_ref),
        );
        debug!(
            "Rebuilt network cache: {} nodes, {} pods, {} services",
            nodes.len(),
            pods.len(),
            services.len()
        );
    }
}

#[async_trait]
impl BackgroundService for Resync {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        let mut ticks = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = shutdown.changed() => {
                    info!("Stopping resync");
                    break;
                }
                _ = ticks.tick() => self.run_once(),
            }
        }
    }
}
