use super::{owner, ClusterState, Pod, Topology, WorkloadId};
use crate::k8s::pod::state as pod_state;
use k8s_openapi::api::core::v1 as k8s;
use kube::ResourceExt;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub ingresses: BTreeSet<String>,
    pub workloads: Vec<WorkloadId>,
    /// Bumped every time the workload snapshot is recomputed.
    pub revision: u64,
}

fn selector(svc: &k8s::Service) -> Option<&BTreeMap<String, String>> {
    svc.spec
        .as_ref()
        .and_then(|spec| spec.selector.as_ref())
        .filter(|selector| !selector.is_empty())
}

fn to_pod(pod: &k8s::Pod) -> Pod {
    Pod {
        name: pod.name_any(),
        state: pod_state(pod),
    }
}

impl Topology {
    /// Captures the workloads currently selected by `svc` and links it to every known ingress
    /// routing to it.
    pub fn on_service_observed(&mut self, svc: &k8s::Service, cluster: &dyn ClusterState) {
        let name = svc.name_any();
        let mut workloads = Vec::new();

        if let Some(selector) = selector(svc) {
            let namespace = svc.namespace().unwrap_or_default();
            for pod in cluster.pods(&namespace, selector) {
                let Some(id) = owner::resolve(&pod, cluster) else {
                    continue;
                };
                self.workloads.add_pod(&id, to_pod(&pod));
                if !workloads.contains(&id) {
                    workloads.push(id);
                }
            }
        }

        let ingresses = self
            .ingresses
            .iter()
            .filter(|(_, ing)| ing.linked_services().contains(&name))
            .map(|(ing, _)| ing.clone())
            .collect();

        self.revision += 1;
        debug!(
            "service {} selects {} workloads, revision {}",
            name,
            workloads.len(),
            self.revision
        );
        self.services.insert(
            name.clone(),
            Service {
                name,
                ingresses,
                workloads,
                revision: self.revision,
            },
        );
    }

    pub fn on_service_removed(&mut self, name: &str) {
        self.services.remove(name);
    }

    /// Recomputes membership only when the label selector changed.
    pub fn on_service_spec_changed(
        &mut self,
        old: &k8s::Service,
        new: &k8s::Service,
        cluster: &dyn ClusterState,
    ) {
        if selector(old) == selector(new) {
            return;
        }
        self.on_service_observed(new, cluster);
    }

    pub fn on_pod_observed(&mut self, pod: &k8s::Pod, cluster: &dyn ClusterState) {
        let Some(id) = owner::resolve(pod, cluster) else {
            return;
        };
        if !self.workloads.contains(&id) && !self.has_service_linked_to(&id) {
            return;
        }
        self.workloads.add_pod(&id, to_pod(pod));
    }

    pub fn on_pod_updated(&mut self, old: &k8s::Pod, new: &k8s::Pod, cluster: &dyn ClusterState) {
        if pod_state(old) == pod_state(new) {
            return;
        }
        self.on_pod_observed(new, cluster);
    }

    pub fn on_pod_removed(&mut self, pod: &k8s::Pod, cluster: &dyn ClusterState) {
        let Some(id) = owner::resolve(pod, cluster) else {
            return;
        };
        self.workloads.remove_pod(&id, &pod.name_any());
    }

    fn has_service_linked_to(&self, id: &WorkloadId) -> bool {
        self.services.values().any(|svc| svc.workloads.contains(id))
    }
}
