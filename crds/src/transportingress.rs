use k8s_openapi::serde::{Deserialize, Serialize};
use kube::CustomResource;
use schemars::JsonSchema;
use std::fmt;

#[derive(Debug, Clone, CustomResource, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "agent.zcloud.cn",
    version = "v1",
    kind = "TransportIngress",
    doc = "TransportIngress exposes cluster services on raw TCP or UDP ports",
    namespaced
)]
pub struct TransportIngressSpec {
    pub protocol: TransportProtocol,
    #[serde(default)]
    pub rules: Vec<TransportIngressRule>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TransportProtocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("TCP"),
            Self::Udp => f.write_str("UDP"),
        }
    }
}

/// A single listening port forwarded to a service.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct TransportIngressRule {
    pub port: u16,
    pub service: TransportIngressService,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct TransportIngressService {
    pub name: String,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn parses_udp_rules() {
        let spec: TransportIngressSpec = serde_json::from_value(serde_json::json!({
            "protocol": "UDP",
            "rules": [
                { "port": 53, "service": { "name": "dns", "port": 5353 } }
            ]
        }))
        .unwrap();

        assert_eq!(spec.protocol, TransportProtocol::Udp);
        assert_eq!(spec.rules.len(), 1);
        assert_eq!(spec.rules[0].port, 53);
        assert_eq!(spec.rules[0].service.name, "dns");
    }

    #[test]
    fn rules_default_to_empty() {
        let spec: TransportIngressSpec =
            serde_json::from_value(serde_json::json!({ "protocol": "TCP" })).unwrap();
        assert_eq!(spec.protocol, TransportProtocol::Tcp);
        assert!(spec.rules.is_empty());
    }

    #[test]
    fn crd_is_namespaced() {
        let crd = TransportIngress::crd();
        assert_eq!(crd.spec.group, "agent.zcloud.cn");
        assert_eq!(crd.spec.scope, "Namespaced");
        assert_eq!(crd.spec.names.kind, "TransportIngress");
    }
}
