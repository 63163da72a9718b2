use super::Topology;
use log::{debug, error, warn};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Http,
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

/// Where a rule accepts traffic: a virtual host for HTTP, a port for TCP and UDP.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Host(String),
    Port(u16),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    pub path: String,
    pub service: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub protocol: Protocol,
    pub endpoint: Endpoint,
    pub paths: Vec<Path>,
}

impl Rule {
    pub fn http(host: impl Into<String>, paths: Vec<Path>) -> Self {
        Self {
            protocol: Protocol::Http,
            endpoint: Endpoint::Host(host.into()),
            paths,
        }
    }

    pub fn transport(protocol: Protocol, port: u16, service: impl Into<String>) -> Self {
        Self {
            protocol,
            endpoint: Endpoint::Port(port),
            paths: vec![Path {
                path: String::new(),
                service: service.into(),
            }],
        }
    }

    pub fn entry_point(&self) -> String {
        match &self.endpoint {
            Endpoint::Host(host) => format!("{}://{}", self.protocol, host),
            Endpoint::Port(port) => format!("{}:{}", self.protocol, port),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ingress {
    pub name: String,
    pub rules: Vec<Rule>,
}

impl Ingress {
    /// Names of every service referenced by any path of any rule.
    pub fn linked_services(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .flat_map(|r| r.paths.iter())
            .map(|p| p.service.clone())
            .collect()
    }

    /// The protocol carried by this object, taken from its first rule.
    pub fn protocol(&self) -> Option<Protocol> {
        self.rules.first().map(|r| r.protocol)
    }

    fn remove_rules(&mut self, protocol: Protocol) {
        self.rules.retain(|r| r.protocol != protocol);
    }
}

impl Topology {
    /// Inserts a new ingress or appends the rules of an already known one. Rules of a protocol
    /// the stored ingress already carries are replaced instead, so a replayed creation leaves
    /// the ingress unchanged.
    pub fn add_or_merge_ingress(&mut self, ingress: Ingress) {
        let name = ingress.name.clone();
        if let (Some(existing), Some(protocol)) = (self.ingresses.get(&name), ingress.protocol()) {
            if existing.rules.iter().any(|r| r.protocol == protocol) {
                self.replace_protocol_rules(&name, protocol, ingress.rules);
                return;
            }
        }

        let linked = match self.ingresses.get_mut(&name) {
            Some(existing) => {
                let before = existing.linked_services();
                existing.rules.extend(ingress.rules);
                existing
                    .linked_services()
                    .difference(&before)
                    .cloned()
                    .collect()
            }
            None if ingress.rules.is_empty() => {
                debug!("ingress {} has no rules, not indexing it", name);
                return;
            }
            None => {
                let linked = ingress.linked_services();
                self.ingresses.insert(name.clone(), ingress);
                linked
            }
        };

        for service in &linked {
            self.link(&name, service);
        }
    }

    /// Replaces every rule of `protocol` in the named ingress with `rules`, leaving rules of
    /// other protocols as they are. Links are maintained from the difference between the
    /// services referenced before and after.
    pub fn replace_protocol_rules(&mut self, name: &str, protocol: Protocol, rules: Vec<Rule>) {
        let Some(ingress) = self.ingresses.get_mut(name) else {
            error!("update unknown ingress {}", name);
            return;
        };
        if ingress.rules.is_empty() {
            error!("update ingress with empty rule {}", name);
            return;
        }

        let before = ingress.linked_services();
        ingress.remove_rules(protocol);
        ingress.rules.extend(rules);
        let after = ingress.linked_services();
        let emptied = ingress.rules.is_empty();

        for service in before.difference(&after) {
            self.unlink(name, service);
        }
        for service in after.difference(&before) {
            self.link(name, service);
        }

        if emptied {
            debug!("ingress {} has no rules left, removing it", name);
            self.ingresses.remove(name);
        }
    }

    pub fn on_ingress_updated(&mut self, old: &Ingress, new: Ingress) {
        match old.protocol() {
            Some(protocol) => self.replace_protocol_rules(&old.name, protocol, new.rules),
            None => self.add_or_merge_ingress(new),
        }
    }

    pub fn on_ingress_removed(&mut self, name: &str, protocol: Protocol) {
        self.replace_protocol_rules(name, protocol, Vec::new());
    }

    fn link(&mut self, ingress: &str, service: &str) {
        match self.services.get_mut(service) {
            Some(svc) => {
                svc.ingresses.insert(ingress.to_string());
            }
            None => warn!(
                "unknown service {} specified in ingress {}",
                service, ingress
            ),
        }
    }

    fn unlink(&mut self, ingress: &str, service: &str) {
        match self.services.get_mut(service) {
            Some(svc) => {
                svc.ingresses.remove(ingress);
            }
            None => warn!(
                "unknown service {} specified in ingress {}",
                service, ingress
            ),
        }
    }
}
