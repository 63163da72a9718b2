use crate::topology::{ClusterState, LookupError};
use crds::TransportIngress;
use k8s_openapi::api::{apps::v1::ReplicaSet, core::v1 as k8s, networking::v1 as networking};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory view of the cluster, filled by the watchers' reflectors.
#[derive(Clone)]
pub struct ClusterCache {
    pub nodes: Store<k8s::Node>,
    pub pods: Store<k8s::Pod>,
    pub replica_sets: Store<ReplicaSet>,
    pub services: Store<k8s::Service>,
    pub ingresses: Store<networking::Ingress>,
    pub transport_ingresses: Store<TransportIngress>,
}

pub fn labels_match(labels: &BTreeMap<String, String>, selector: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

impl ClusterState for ClusterCache {
    fn pods(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Vec<Arc<k8s::Pod>> {
        self.pods
            .state()
            .into_iter()
            .filter(|pod| pod.namespace().as_deref() == Some(namespace))
            .filter(|pod| labels_match(pod.labels(), selector))
            .collect()
    }

    fn replica_set(&self, namespace: &str, name: &str) -> Result<Arc<ReplicaSet>, LookupError> {
        self.replica_sets
            .get(&ObjectRef::new(name).within(namespace))
            .ok_or_else(|| LookupError::NotFound {
                kind: "replicaset",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    fn services(&self) -> Vec<Arc<k8s::Service>> {
        self.services.state()
    }

    fn ingresses(&self) -> Vec<Arc<networking::Ingress>> {
        self.ingresses.state()
    }

    fn transport_ingresses(&self) -> Vec<Arc<TransportIngress>> {
        self.transport_ingresses.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn selector_must_be_a_subset_of_labels() {
        let labels = btreemap! {
            "app".to_string() => "web".to_string(),
            "tier".to_string() => "frontend".to_string(),
        };
        assert!(labels_match(&labels, &btreemap! {"app".to_string() => "web".to_string()}));
        assert!(labels_match(&labels, &labels.clone()));
        assert!(!labels_match(&labels, &btreemap! {"app".to_string() => "api".to_string()}));
        assert!(!labels_match(
            &btreemap! {},
            &btreemap! {"app".to_string() => "web".to_string()}
        ));
    }
}
