use crate::topology::{Ingress, Path, Protocol, Rule};
use crds::{TransportIngress, TransportProtocol};
use k8s_openapi::api::networking::v1 as networking;
use kube::ResourceExt;

impl From<&networking::Ingress> for Ingress {
    fn from(ing: &networking::Ingress) -> Self {
        let rules = ing
            .spec
            .iter()
            .flat_map(|spec| spec.rules.iter().flatten())
            .filter_map(|rule| {
                let http = rule.http.as_ref()?;
                let paths = http
                    .paths
                    .iter()
                    .filter_map(|p| {
                        let backend = p.backend.service.as_ref()?;
                        Some(Path {
                            path: p.path.clone().unwrap_or_default(),
                            service: backend.name.clone(),
                        })
                    })
                    .collect();
                Some(Rule::http(rule.host.clone().unwrap_or_default(), paths))
            })
            .collect();

        Self {
            name: ing.name_any(),
            rules,
        }
    }
}

impl From<TransportProtocol> for Protocol {
    fn from(protocol: TransportProtocol) -> Self {
        match protocol {
            TransportProtocol::Tcp => Self::Tcp,
            TransportProtocol::Udp => Self::Udp,
        }
    }
}

impl From<&TransportIngress> for Ingress {
    fn from(ing: &TransportIngress) -> Self {
        let protocol = Protocol::from(ing.spec.protocol);
        let rules = ing
            .spec
            .rules
            .iter()
            .map(|rule| Rule::transport(protocol, rule.port, rule.service.name.clone()))
            .collect();

        Self {
            name: ing.name_any(),
            rules,
        }
    }
}
