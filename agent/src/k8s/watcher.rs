use crate::k8s::event::{Change, Tracker};
use crate::k8s::Object;
use crate::server::{BackgroundService, ShutdownWatch};
use anyhow::anyhow;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use kube::runtime::reflector::{self, Store};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Api;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time;

type EventStream<K> = BoxStream<'static, Result<Event<K>, watcher::Error>>;

/// Watches one resource kind, keeps its reflector store current and hands every change to
/// `update`.
pub struct Service<K, F>
where
    K: Object,
    F: Fn(Change<K>) + Send + Sync + 'static,
{
    kind: &'static str,
    events: Mutex<Option<EventStream<K>>>,
    tracker: Mutex<Tracker<K>>,
    update: F,
    failure: mpsc::Sender<anyhow::Error>,
}

impl<K, F> Service<K, F>
where
    K: Object,
    F: Fn(Change<K>) + Send + Sync + 'static,
{
    pub fn new(
        kind: &'static str,
        events: EventStream<K>,
        tracker: Tracker<K>,
        update: F,
        failure_bus: mpsc::Sender<anyhow::Error>,
    ) -> Self {
        Self {
            kind,
            events: Mutex::new(Some(events)),
            tracker: Mutex::new(tracker),
            update,
            failure: failure_bus,
        }
    }

    async fn fail(&self, e: anyhow::Error) {
        if let Err(e) = self.failure.send(e).await {
            error!("Error sending error result failure channel: {}", e);
        }
    }
}

#[async_trait]
impl<K, F> BackgroundService for Service<K, F>
where
    K: Object,
    F: Fn(Change<K>) + Send + Sync + 'static,
{
    async fn start(&self, mut shutdown: ShutdownWatch) {
        let events = self.events.lock().take();
        let Some(mut events) = events else {
            self.fail(anyhow!("{} watcher started twice", self.kind)).await;
            return;
        };
        info!("Starting Kubernetes {} watch", self.kind);

        loop {
            select! {
                _ = shutdown.changed() => {
                    info!("Stopping Kubernetes {} watch", self.kind);
                    break;
                }
                event = events.try_next() => match event {
                    Ok(Some(event)) => {
                        let changes = self.tracker.lock().observe(event);
                        debug!("Received {} {} changes", changes.len(), self.kind);
                        for change in changes {
                            (self.update)(change);
                        }
                    }
                    Ok(None) => {
                        self.fail(anyhow!("{} watch stream ended", self.kind)).await;
                        break;
                    }
                    Err(e) => {
                        error!("Unable to read from {} stream: {}", self.kind, e);
                    }
                }
            }
        }
    }
}

/// Creates a store for `K` and the watch stream that keeps it up to date. The store is only
/// filled while the stream is polled.
pub fn reflect<K: Object>(
    client: kube::client::Client,
    config: watcher::Config,
) -> (Store<K>, EventStream<K>) {
    let api = Api::<K>::all(client);
    let (store, writer) = reflector::store();
    let stream = reflector::reflector(writer, watcher::watcher(api, config).default_backoff())
        .boxed();
    (store, stream)
}

/// Waits until `store` holds its first full listing.
///
/// With a `timeout` the store is optional: `Ok(false)` means it was not ready in time and the
/// caller carries on without it. The watch keeps running and fills the store later.
pub async fn wait_ready<K: Object>(
    kind: &str,
    store: &Store<K>,
    timeout: Option<Duration>,
) -> Result<bool, anyhow::Error> {
    let ready = match timeout {
        Some(timeout) => match time::timeout(timeout, store.wait_until_ready()).await {
            Ok(ready) => ready,
            Err(_) => {
                warn!(
                    "{} cache not ready after {:?}, continuing without it",
                    kind, timeout
                );
                return Ok(false);
            }
        },
        None => store.wait_until_ready().await,
    };
    ready.map_err(|e| anyhow!("{} cache never became ready: {}", kind, e))?;
    info!("Cached {} {} objects", store.state().len(), kind);
    Ok(true)
}
