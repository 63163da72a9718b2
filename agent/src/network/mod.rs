use crate::k8s::event::{Change, ResourceEvent};
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use kube::ResourceExt;
use log::debug;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SharedNetwork = Arc<RwLock<NetworkCache>>;

pub const INTERNAL_IP_ANNOTATION: &str = "zdnscloud.cn/internal-ip";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeNetwork {
    pub name: String,
    pub ip: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PodIp {
    pub namespace: String,
    pub name: String,
    pub ip: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodNetwork {
    pub node_name: String,
    #[serde(rename = "podCIDR")]
    pub pod_cidr: String,
    #[serde(rename = "podIPs")]
    pub pod_ips: Vec<PodIp>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceNetwork {
    pub namespace: String,
    pub name: String,
    pub ip: String,
}

/// Node addresses, pod addresses grouped by node, and service cluster IPs.
#[derive(Debug, Default)]
pub struct NetworkCache {
    nodes: BTreeMap<String, NodeNetwork>,
    pods: BTreeMap<String, PodNetwork>,
    services: BTreeMap<(String, String), ServiceNetwork>,
}

fn node_ip(node: &Node) -> String {
    if let Some(ip) = node.annotations().get(INTERNAL_IP_ANNOTATION) {
        return ip.clone();
    }
    node.status
        .iter()
        .flat_map(|s| s.addresses.iter().flatten())
        .find(|a| a.type_ == "InternalIP")
        .map(|a| a.address.clone())
        .unwrap_or_default()
}

fn pod_ip(pod: &Pod) -> Option<&str> {
    pod.status.as_ref()?.pod_ip.as_deref().filter(|ip| !ip.is_empty())
}

fn pod_node(pod: &Pod) -> Option<&str> {
    pod.spec.as_ref()?.node_name.as_deref()
}

fn cluster_ip(svc: &Service) -> Option<&str> {
    svc.spec
        .as_ref()?
        .cluster_ip
        .as_deref()
        .filter(|ip| !ip.is_empty() && *ip != "None")
}

impl NetworkCache {
    pub fn shared() -> SharedNetwork {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Drops everything and reloads from a full listing. Nodes go first so pods find their
    /// node entry.
    pub fn rebuild<'a>(
        &mut self,
        nodes: impl IntoIterator<Item = &'a Node>,
        pods: impl IntoIterator<Item = &'a Pod>,
        services: impl IntoIterator<Item = &'a Service>,
    ) {
        *self = Self::default();
        for node in nodes {
            self.on_new_node(node);
        }
        for pod in pods {
            self.on_new_pod(pod);
        }
        for svc in services {
            self.on_new_service(svc);
        }
    }

    pub fn apply(&mut self, event: &ResourceEvent) {
        match event {
            ResourceEvent::Node(Change::Created(node)) => self.on_new_node(node),
            ResourceEvent::Node(Change::Deleted(node)) => self.on_delete_node(node),
            ResourceEvent::Pod(Change::Created(pod)) => self.on_new_pod(pod),
            ResourceEvent::Pod(Change::Updated { old, new }) => self.on_update_pod(old, new),
            ResourceEvent::Pod(Change::Deleted(pod)) => self.on_delete_pod(pod),
            ResourceEvent::Service(Change::Created(svc)) => self.on_new_service(svc),
            ResourceEvent::Service(Change::Updated { old, new }) => {
                if cluster_ip(old) != cluster_ip(new) {
                    self.on_new_service(new);
                }
            }
            ResourceEvent::Service(Change::Deleted(svc)) => self.on_delete_service(svc),
            _ => {}
        }
    }

    pub fn node_networks(&self) -> Vec<NodeNetwork> {
        self.nodes.values().cloned().collect()
    }

    pub fn pod_networks(&self) -> Vec<PodNetwork> {
        self.pods.values().cloned().collect()
    }

    pub fn service_networks(&self) -> Vec<ServiceNetwork> {
        self.services.values().cloned().collect()
    }

    fn on_new_node(&mut self, node: &Node) {
        let name = node.name_any();
        let pod_cidr = node
            .spec
            .as_ref()
            .and_then(|s| s.pod_cidr.clone())
            .unwrap_or_default();
        self.nodes.insert(
            name.clone(),
            NodeNetwork {
                name: name.clone(),
                ip: node_ip(node),
            },
        );
        self.pods
            .entry(name.clone())
            .and_modify(|pn| pn.pod_cidr = pod_cidr.clone())
            .or_insert_with(|| PodNetwork {
                node_name: name,
                pod_cidr,
                pod_ips: Vec::new(),
            });
    }

    fn on_delete_node(&mut self, node: &Node) {
        let name = node.name_any();
        self.nodes.remove(&name);
        self.pods.remove(&name);
    }

    fn on_new_pod(&mut self, pod: &Pod) {
        let (Some(ip), Some(node)) = (pod_ip(pod), pod_node(pod)) else {
            return;
        };
        let Some(network) = self.pods.get_mut(node) else {
            debug!("pod {} is on unknown node {}", pod.name_any(), node);
            return;
        };

        let namespace = pod.namespace().unwrap_or_default();
        let name = pod.name_any();
        network
            .pod_ips
            .retain(|p| !(p.namespace == namespace && p.name == name));
        network.pod_ips.push(PodIp {
            namespace,
            name,
            ip: ip.to_string(),
        });
    }

    fn on_update_pod(&mut self, old: &Pod, new: &Pod) {
        if pod_ip(old) == pod_ip(new) && pod_node(old) == pod_node(new) {
            return;
        }
        self.on_delete_pod(old);
        self.on_new_pod(new);
    }

    fn on_delete_pod(&mut self, pod: &Pod) {
        let Some(network) = pod_node(pod).and_then(|node| self.pods.get_mut(node)) else {
            return;
        };
        let namespace = pod.namespace().unwrap_or_default();
        let name = pod.name_any();
        network
            .pod_ips
            .retain(|p| !(p.namespace == namespace && p.name == name));
    }

    fn on_new_service(&mut self, svc: &Service) {
        let key = (svc.namespace().unwrap_or_default(), svc.name_any());
        match cluster_ip(svc) {
            Some(ip) => {
                self.services.insert(
                    key.clone(),
                    ServiceNetwork {
                        namespace: key.0,
                        name: key.1,
                        ip: ip.to_string(),
                    },
                );
            }
            None => {
                self.services.remove(&key);
            }
        }
    }

    fn on_delete_service(&mut self, svc: &Service) {
        self.services
            .remove(&(svc.namespace().unwrap_or_default(), svc.name_any()));
    }
}
