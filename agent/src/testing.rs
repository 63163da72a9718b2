//! Fixtures shared by the unit tests.

use crate::k8s::cache::labels_match;
use crate::topology::{ClusterState, LookupError};
use crds::{
    TransportIngress, TransportIngressRule, TransportIngressService, TransportIngressSpec,
    TransportProtocol,
};
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{
    Node, NodeAddress, NodeSpec, NodeStatus, Pod, PodSpec, PodStatus, Service, ServiceSpec,
};
use k8s_openapi::api::networking::v1 as networking;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type Labels = BTreeMap<String, String>;

pub fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn meta(ns: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(ns.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub fn owner(kind: &str, name: &str) -> OwnerReference {
    OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("{}-{}", kind.to_lowercase(), name),
        controller: Some(true),
        ..Default::default()
    }
}

pub fn mk_pod(ns: &str, name: &str, labels: Labels, owners: Vec<OwnerReference>) -> Pod {
    Pod {
        metadata: ObjectMeta {
            labels: Some(labels),
            owner_references: Some(owners),
            ..meta(ns, name)
        },
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn with_phase(mut pod: Pod, phase: &str) -> Pod {
    pod.status.get_or_insert_with(Default::default).phase = Some(phase.to_string());
    pod
}

pub fn with_pod_ip(mut pod: Pod, node: &str, ip: &str) -> Pod {
    pod.spec = Some(PodSpec {
        node_name: Some(node.to_string()),
        ..Default::default()
    });
    pod.status.get_or_insert_with(Default::default).pod_ip = Some(ip.to_string());
    pod
}

pub fn mk_replica_set(ns: &str, name: &str, owners: Vec<OwnerReference>) -> ReplicaSet {
    ReplicaSet {
        metadata: ObjectMeta {
            owner_references: Some(owners),
            ..meta(ns, name)
        },
        ..Default::default()
    }
}

pub fn mk_service(ns: &str, name: &str, selector: Labels) -> Service {
    Service {
        metadata: meta(ns, name),
        spec: Some(ServiceSpec {
            selector: Some(selector),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn with_cluster_ip(mut svc: Service, ip: &str) -> Service {
    svc.spec.get_or_insert_with(Default::default).cluster_ip = Some(ip.to_string());
    svc
}

pub fn mk_node(name: &str, ip: &str, pod_cidr: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(NodeSpec {
            pod_cidr: Some(pod_cidr.to_string()),
            ..Default::default()
        }),
        status: Some(NodeStatus {
            addresses: Some(vec![NodeAddress {
                type_: "InternalIP".to_string(),
                address: ip.to_string(),
            }]),
            ..Default::default()
        }),
    }
}

/// An ingress with one rule per `(host, [(path, service)])` entry.
pub fn mk_http_ingress(
    ns: &str,
    name: &str,
    rules: Vec<(&str, Vec<(&str, &str)>)>,
) -> networking::Ingress {
    let rules = rules
        .into_iter()
        .map(|(host, paths)| networking::IngressRule {
            host: Some(host.to_string()),
            http: Some(networking::HTTPIngressRuleValue {
                paths: paths
                    .into_iter()
                    .map(|(path, service)| networking::HTTPIngressPath {
                        path: Some(path.to_string()),
                        path_type: "Prefix".to_string(),
                        backend: networking::IngressBackend {
                            service: Some(networking::IngressServiceBackend {
                                name: service.to_string(),
                                port: Some(networking::ServiceBackendPort {
                                    number: Some(80),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    })
                    .collect(),
            }),
        })
        .collect();

    networking::Ingress {
        metadata: meta(ns, name),
        spec: Some(networking::IngressSpec {
            rules: Some(rules),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A transport ingress with one rule per `(port, service)` entry.
pub fn mk_transport_ingress(
    ns: &str,
    name: &str,
    protocol: TransportProtocol,
    rules: Vec<(u16, &str)>,
) -> TransportIngress {
    let mut ing = TransportIngress::new(
        name,
        TransportIngressSpec {
            protocol,
            rules: rules
                .into_iter()
                .map(|(port, service)| TransportIngressRule {
                    port,
                    service: TransportIngressService {
                        name: service.to_string(),
                        port,
                    },
                })
                .collect(),
        },
    );
    ing.metadata.namespace = Some(ns.to_string());
    ing
}

/// A cluster cache backed by plain vectors.
#[derive(Default)]
pub struct FakeCluster {
    pub pods: Vec<Arc<Pod>>,
    pub replica_sets: Vec<Arc<ReplicaSet>>,
    pub services: Vec<Arc<Service>>,
    pub ingresses: Vec<Arc<networking::Ingress>>,
    pub transport_ingresses: Vec<Arc<TransportIngress>>,
}

impl FakeCluster {
    pub fn add_pod(&mut self, pod: Pod) {
        self.pods.push(Arc::new(pod));
    }

    pub fn add_replica_set(&mut self, rs: ReplicaSet) {
        self.replica_sets.push(Arc::new(rs));
    }

    /// Adds a deployment's replica set plus `pods` owned by it, labelled `labels`.
    pub fn add_deployment(&mut self, ns: &str, name: &str, labels: Labels, pods: usize) {
        let rs = format!("{}-5d4f8", name);
        self.add_replica_set(mk_replica_set(ns, &rs, vec![owner("Deployment", name)]));
        for i in 0..pods {
            self.add_pod(mk_pod(
                ns,
                &format!("{}-{}", rs, i),
                labels.clone(),
                vec![owner("ReplicaSet", &rs)],
            ));
        }
    }
}

impl ClusterState for FakeCluster {
    fn pods(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Vec<Arc<Pod>> {
        self.pods
            .iter()
            .filter(|p| p.namespace().as_deref() == Some(namespace))
            .filter(|p| labels_match(p.labels(), selector))
            .cloned()
            .collect()
    }

    fn replica_set(&self, namespace: &str, name: &str) -> Result<Arc<ReplicaSet>, LookupError> {
        self.replica_sets
            .iter()
            .find(|rs| rs.namespace().as_deref() == Some(namespace) && rs.name_any() == name)
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                kind: "replicaset",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    fn services(&self) -> Vec<Arc<Service>> {
        self.services.clone()
    }

    fn ingresses(&self) -> Vec<Arc<networking::Ingress>> {
        self.ingresses.clone()
    }

    fn transport_ingresses(&self) -> Vec<Arc<TransportIngress>> {
        self.transport_ingresses.clone()
    }
}
