use crate::k8s::cache::ClusterCache;
use crate::k8s::event::{Change, ResourceEvent, Tracker};
use crate::k8s::resync::Resync;
use crate::k8s::watcher::{reflect, wait_ready};
use crate::network::{NetworkCache, SharedNetwork};
use crate::server::Server;
use crate::topology::{Index, SharedIndex};
use anyhow::anyhow;
use clap::Parser;
use crds::TransportIngress;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::watcher::Config as WatchConfig;
use log::{error, info};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::signal;
use tokio::sync::mpsc;

mod api;
mod k8s;
mod network;
mod server;
#[cfg(test)]
mod testing;
mod topology;

const OPTIONAL_CACHE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(version, about = "Serves the service topology of a Kubernetes cluster", long_about = None)]
struct CliArgs {
    #[arg(short, long, default_value = "/etc/cluster-agent/config.yaml")]
    config_file: String,

    #[arg(long, default_value_t = log::LevelFilter::Info)]
    log_level: log::LevelFilter,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = CliArgs::parse();
    env_logger::builder()
        .filter_level(cli_args.log_level)
        .init();

    match run(cli_args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Feeds every change of one kind into the index and/or the network cache.
fn apply_to<K>(
    index: Option<SharedIndex>,
    network: Option<SharedNetwork>,
) -> impl Fn(Change<K>) + Send + Sync + 'static
where
    ResourceEvent: From<Change<K>>,
{
    move |change| {
        let event = ResourceEvent::from(change);
        if let Some(index) = &index {
            index.write().apply(&event);
        }
        if let Some(network) = &network {
            network.write().apply(&event);
        }
    }
}

/// Resolves once the agent is interrupted (`Ok`) or a watcher fails (`Err`).
async fn stopped(failures: &mut mpsc::Receiver<anyhow::Error>) -> Result<(), anyhow::Error> {
    select! {
        signal = signal::ctrl_c() => match signal {
            Ok(()) => {
                info!("Received interrupt");
                Ok(())
            }
            Err(e) => Err(anyhow!("unable to listen for interrupt: {}", e)),
        },
        Some(failure) = failures.recv() => Err(anyhow!("watcher error: {}", failure)),
    }
}

/// Drives `stage` unless the agent is stopped first, in which case `None` is returned.
async fn until_stopped<T>(
    stage: impl Future<Output = Result<T, anyhow::Error>>,
    failures: &mut mpsc::Receiver<anyhow::Error>,
) -> Result<Option<T>, anyhow::Error> {
    select! {
        result = stage => result.map(Some),
        result = stopped(failures) => result.map(|()| None),
    }
}

async fn run(args: CliArgs) -> Result<(), anyhow::Error> {
    let config = server::config::load(&args.config_file)?;
    let client = kube::Client::try_default()
        .await
        .map_err(|e| anyhow!("unable to create Kubernetes client: {}", e))?;
    let (failure_tx, mut failure_rx) = mpsc::channel(1);

    let (nodes, node_events) = reflect::<Node>(client.clone(), WatchConfig::default());
    let (replica_sets, replica_set_events) =
        reflect::<ReplicaSet>(client.clone(), WatchConfig::default());
    let (pods, pod_events) = reflect::<Pod>(client.clone(), WatchConfig::default());
    let (services, service_events) = reflect::<Service>(client.clone(), WatchConfig::default());
    let (ingresses, ingress_events) = reflect::<Ingress>(client.clone(), WatchConfig::default());
    let (transport_ingresses, transport_ingress_events) =
        reflect::<TransportIngress>(client, WatchConfig::default());

    let cache = ClusterCache {
        nodes,
        pods,
        replica_sets,
        services,
        ingresses,
        transport_ingresses,
    };
    let index = Index::shared(Arc::new(cache.clone()));
    let network = NetworkCache::shared();
    let mut server = Server::new();

    let startup = async {
        // Pods are grouped by node, so nodes have to be known first.
        server.add_service(
            "Kubernetes Node watcher",
            k8s::watcher::Service::new(
                "node",
                node_events,
                Tracker::default(),
                apply_to::<Node>(None, Some(network.clone())),
                failure_tx.clone(),
            ),
        );
        server.start();
        wait_ready("node", &cache.nodes, None).await?;

        // Services resolve their workloads through pods and replica sets.
        server.add_service(
            "Kubernetes ReplicaSet watcher",
            k8s::watcher::Service::new(
                "replicaset",
                replica_set_events,
                Tracker::default(),
                |_: Change<ReplicaSet>| {},
                failure_tx.clone(),
            ),
        );
        server.add_service(
            "Kubernetes Pod watcher",
            k8s::watcher::Service::new(
                "pod",
                pod_events,
                Tracker::default(),
                apply_to::<Pod>(Some(index.clone()), Some(network.clone())),
                failure_tx.clone(),
            ),
        );
        server.start();
        wait_ready("replicaset", &cache.replica_sets, None).await?;
        wait_ready("pod", &cache.pods, None).await?;

        server.add_service(
            "Kubernetes Service watcher",
            k8s::watcher::Service::new(
                "service",
                service_events,
                Tracker::default(),
                apply_to::<Service>(Some(index.clone()), Some(network.clone())),
                failure_tx.clone(),
            ),
        );
        server.add_service(
            "Kubernetes Ingress watcher",
            k8s::watcher::Service::new(
                "ingress",
                ingress_events,
                Tracker::default(),
                apply_to::<Ingress>(Some(index.clone()), None),
                failure_tx.clone(),
            ),
        );
        server.add_service(
            "Kubernetes TransportIngress watcher",
            k8s::watcher::Service::new(
                "transportingress",
                transport_ingress_events,
                Tracker::default(),
                apply_to::<TransportIngress>(Some(index.clone()), None),
                failure_tx,
            ),
        );
        server.start();
        wait_ready("service", &cache.services, None).await?;
        wait_ready("ingress", &cache.ingresses, None).await?;
        // The TransportIngress CRD may not be installed yet.
        wait_ready(
            "transportingress",
            &cache.transport_ingresses,
            Some(OPTIONAL_CACHE_TIMEOUT),
        )
        .await?;
        Ok::<_, anyhow::Error>(())
    };
    let outcome = until_stopped(startup, &mut failure_rx).await;

    let result = match outcome {
        Ok(Some(())) => {
            if config.topology.resync_interval_secs > 0 {
                server.add_service(
                    "Resync",
                    Resync::new(
                        index.clone(),
                        network.clone(),
                        cache,
                        Duration::from_secs(config.topology.resync_interval_secs),
                    ),
                );
            }
            server.add_service(
                "API web service",
                api::Service::new(config.api.port, api::State { index, network }),
            );
            server.start();
            stopped(&mut failure_rx).await
        }
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };
    server.shutdown().await;
    result
}
