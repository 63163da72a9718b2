//! Service topology index.
//!
//! The index derives which workloads back each service and which ingresses expose it, from
//! independent Pod, Service, Ingress and TransportIngress events:
//!
//! ```text
//! [ Ingress ] -> [ Service ] -> [ Workload ] -> [ Pod ]
//! ```
//!
//! A service's workloads are captured from the pods its selector matches when the service is
//! observed; each pod is attributed to a workload by walking its owner chain (see [`owner`]).
//! Ingress links are maintained by diffing the services referenced by an ingress before and
//! after each change, one protocol at a time, so HTTP and TCP/UDP routes sharing an ingress name
//! never clobber each other.
//!
//! Every namespace has its own [`Topology`]. All of them live in one [`Index`] that is shared
//! behind a single reader/writer lock.

mod ingress;
pub mod owner;
mod service;
mod workload;


pub use self::{
    ingress::{Ingress, Path, Protocol, Rule},
    service::Service,
    workload::{Pod, Workload, WorkloadId, Workloads},
};
use crate::k8s::event::{Change, ResourceEvent};
use crds::TransportIngress;
use k8s_openapi::api::{apps::v1::ReplicaSet, core::v1 as k8s, networking::v1 as networking};
use kube::ResourceExt;
use log::{debug, info};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

pub type SharedIndex = Arc<RwLock<Index>>;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
}

/// Read access to the cluster state cached by the watchers.
///
/// Implementations must answer from memory; they are called with the index write lock held.
pub trait ClusterState: Send + Sync {
    /// Pods in `namespace` whose labels include every pair in `selector`.
    fn pods(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Vec<Arc<k8s::Pod>>;

    fn replica_set(&self, namespace: &str, name: &str) -> Result<Arc<ReplicaSet>, LookupError>;

    fn services(&self) -> Vec<Arc<k8s::Service>>;

    fn ingresses(&self) -> Vec<Arc<networking::Ingress>>;

    fn transport_ingresses(&self) -> Vec<Arc<TransportIngress>>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InnerService {
    pub name: String,
    pub workloads: Vec<Workload>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OuterService {
    pub entry_point: String,
    pub services: BTreeMap<String, InnerService>,
}

/// Services, ingresses and workloads of one namespace.
#[derive(Debug, Default)]
pub struct Topology {
    services: BTreeMap<String, Service>,
    ingresses: BTreeMap<String, Ingress>,
    workloads: Workloads,
    revision: u64,
}

impl Topology {
    #[cfg(test)]
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    #[cfg(test)]
    pub fn ingress(&self, name: &str) -> Option<&Ingress> {
        self.ingresses.get(name)
    }

    #[cfg(test)]
    pub fn workloads(&self) -> &Workloads {
        &self.workloads
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.ingresses.is_empty() && self.workloads.is_empty()
    }

    /// Services no ingress routes to.
    pub fn inner_services(&self) -> Vec<InnerService> {
        self.services
            .values()
            .filter(|svc| svc.ingresses.is_empty())
            .map(|svc| self.to_inner_service(svc))
            .collect()
    }

    /// One entry per rule of every ingress that routes to at least one known service.
    pub fn outer_services(&self) -> Vec<OuterService> {
        let ingresses: BTreeSet<&String> = self
            .services
            .values()
            .flat_map(|svc| svc.ingresses.iter())
            .collect();

        ingresses
            .into_iter()
            .filter_map(|name| self.ingresses.get(name))
            .flat_map(|ing| ing.rules.iter())
            .map(|rule| OuterService {
                entry_point: rule.entry_point(),
                services: rule
                    .paths
                    .iter()
                    .filter_map(|p| {
                        let svc = self.services.get(&p.service)?;
                        Some((p.path.clone(), self.to_inner_service(svc)))
                    })
                    .collect(),
            })
            .collect()
    }

    fn to_inner_service(&self, svc: &Service) -> InnerService {
        InnerService {
            name: svc.name.clone(),
            workloads: svc
                .workloads
                .iter()
                .filter_map(|id| self.workloads.get(id).cloned())
                .collect(),
        }
    }
}

/// Topologies of every namespace, updated from watch events.
pub struct Index {
    cluster: Arc<dyn ClusterState>,
    namespaces: BTreeMap<String, Topology>,
}

impl Index {
    pub fn new(cluster: Arc<dyn ClusterState>) -> Self {
        Self {
            cluster,
            namespaces: BTreeMap::new(),
        }
    }

    pub fn shared(cluster: Arc<dyn ClusterState>) -> SharedIndex {
        Arc::new(RwLock::new(Self::new(cluster)))
    }

    pub fn namespace(&self, namespace: &str) -> Option<&Topology> {
        self.namespaces.get(namespace)
    }

    pub fn inner_services(&self, namespace: &str) -> Vec<InnerService> {
        self.namespace(namespace)
            .map(Topology::inner_services)
            .unwrap_or_default()
    }

    pub fn outer_services(&self, namespace: &str) -> Vec<OuterService> {
        self.namespace(namespace)
            .map(Topology::outer_services)
            .unwrap_or_default()
    }

    /// Loads a full listing. Services go first so ingresses can link to them.
    pub fn seed<'a>(
        &mut self,
        services: impl IntoIterator<Item = &'a k8s::Service>,
        ingresses: impl IntoIterator<Item = &'a networking::Ingress>,
        transport_ingresses: impl IntoIterator<Item = &'a TransportIngress>,
    ) {
        for svc in services {
            self.service_created(svc);
        }
        for ing in ingresses {
            self.ingress_created(ing);
        }
        for ing in transport_ingresses {
            self.transport_ingress_created(ing);
        }
    }

    /// Replaces the whole index with one built from the cluster cache.
    pub fn rebuild(&mut self) {
        let cluster = self.cluster.clone();
        let mut fresh = Self::new(cluster.clone());
        let services = cluster.services();
        let ingresses = cluster.ingresses();
        let transport_ingresses = cluster.transport_ingresses();
        fresh.seed(
            services.iter().map(Arc::as_ref),
            ingresses.iter().map(Arc::as_ref),
            transport_ingresses.iter().map(Arc::as_ref),
        );
        info!(
            "Rebuilt service topology: {} services, {} ingresses, {} transport ingresses",
            services.len(),
            ingresses.len(),
            transport_ingresses.len()
        );
        *self = fresh;
    }

    pub fn apply(&mut self, event: &ResourceEvent) {
        match event {
            ResourceEvent::Node(_) => {}
            ResourceEvent::Pod(change) => self.apply_pod(change),
            ResourceEvent::Service(change) => self.apply_service(change),
            ResourceEvent::Ingress(change) => self.apply_ingress(change),
            ResourceEvent::TransportIngress(change) => self.apply_transport_ingress(change),
        }
    }

    fn apply_pod(&mut self, change: &Change<k8s::Pod>) {
        let cluster = self.cluster.clone();
        let Some(topology) = self.namespaces.get_mut(&namespace_of(change.resource())) else {
            return;
        };
        match change {
            Change::Created(pod) => topology.on_pod_observed(pod, &*cluster),
            Change::Updated { old, new } => topology.on_pod_updated(old, new, &*cluster),
            Change::Deleted(pod) => topology.on_pod_removed(pod, &*cluster),
        }
    }

    fn apply_service(&mut self, change: &Change<k8s::Service>) {
        match change {
            Change::Created(svc) => self.service_created(svc),
            Change::Updated { old, new } => {
                let cluster = self.cluster.clone();
                self.topology_mut(new)
                    .on_service_spec_changed(old, new, &*cluster);
            }
            Change::Deleted(svc) => {
                self.with_existing(svc, |t| t.on_service_removed(&svc.name_any()));
            }
        }
    }

    fn apply_ingress(&mut self, change: &Change<networking::Ingress>) {
        match change {
            Change::Created(ing) => self.ingress_created(ing),
            Change::Updated { old, new } => {
                let (old_ing, new_ing) = (Ingress::from(old), Ingress::from(new));
                self.topology_mut(new).on_ingress_updated(&old_ing, new_ing);
            }
            Change::Deleted(ing) => self.ingress_deleted(ing, Ingress::from(ing)),
        }
    }

    fn apply_transport_ingress(&mut self, change: &Change<TransportIngress>) {
        match change {
            Change::Created(ing) => self.transport_ingress_created(ing),
            Change::Updated { old, new } => {
                let (old_ing, new_ing) = (Ingress::from(old), Ingress::from(new));
                self.topology_mut(new).on_ingress_updated(&old_ing, new_ing);
            }
            Change::Deleted(ing) => self.ingress_deleted(ing, Ingress::from(ing)),
        }
    }

    fn service_created(&mut self, svc: &k8s::Service) {
        let cluster = self.cluster.clone();
        self.topology_mut(svc).on_service_observed(svc, &*cluster);
    }

    fn ingress_created(&mut self, ing: &networking::Ingress) {
        self.topology_mut(ing).add_or_merge_ingress(Ingress::from(ing));
    }

    fn transport_ingress_created(&mut self, ing: &TransportIngress) {
        self.topology_mut(ing).add_or_merge_ingress(Ingress::from(ing));
    }

    fn ingress_deleted<K: ResourceExt>(&mut self, resource: &K, ingress: Ingress) {
        let Some(protocol) = ingress.protocol() else {
            debug!("deleted ingress {} carried no rules", ingress.name);
            return;
        };
        self.with_existing(resource, |t| t.on_ingress_removed(&ingress.name, protocol));
    }

    fn topology_mut<K: ResourceExt>(&mut self, resource: &K) -> &mut Topology {
        self.namespaces.entry(namespace_of(resource)).or_default()
    }

    fn with_existing<K: ResourceExt>(&mut self, resource: &K, f: impl FnOnce(&mut Topology)) {
        let namespace = namespace_of(resource);
        let Some(topology) = self.namespaces.get_mut(&namespace) else {
            return;
        };
        f(topology);
        if topology.is_empty() {
            self.namespaces.remove(&namespace);
        }
    }
}

fn namespace_of<K: ResourceExt>(resource: &K) -> String {
    resource.namespace().unwrap_or_default()
}
