use crate::k8s::Object;
use crds::TransportIngress;
use k8s_openapi::api::{core::v1 as k8s, networking::v1 as networking};
use kube::runtime::watcher::Event;
use kube::ResourceExt;
use std::collections::HashMap;

/// A single object transition, as seen by one watch.
#[derive(Clone, Debug, PartialEq)]
pub enum Change<K> {
    Created(K),
    Updated { old: K, new: K },
    Deleted(K),
}

impl<K> Change<K> {
    /// The most recent version of the object.
    pub fn resource(&self) -> &K {
        match self {
            Self::Created(r) | Self::Deleted(r) => r,
            Self::Updated { new, .. } => new,
        }
    }
}

/// Changes of every watched kind.
#[derive(Clone, Debug)]
pub enum ResourceEvent {
    Node(Change<k8s::Node>),
    Pod(Change<k8s::Pod>),
    Service(Change<k8s::Service>),
    Ingress(Change<networking::Ingress>),
    TransportIngress(Change<TransportIngress>),
}

macro_rules! impl_from_change {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl From<Change<$ty>> for ResourceEvent {
                fn from(change: Change<$ty>) -> Self {
                    Self::$variant(change)
                }
            }
        )+
    };
}

impl_from_change! {
    Node => k8s::Node,
    Pod => k8s::Pod,
    Service => k8s::Service,
    Ingress => networking::Ingress,
    TransportIngress => TransportIngress,
}

type Key = (Option<String>, String);

fn key_of<K: Object>(obj: &K) -> Key {
    (obj.namespace(), obj.name_any())
}

/// Remembers the last version of every object seen on a watch, turning watcher events into
/// create/update/delete changes.
#[derive(Debug)]
pub struct Tracker<K> {
    seen: HashMap<Key, K>,
}

impl<K> Default for Tracker<K> {
    fn default() -> Self {
        Self {
            seen: HashMap::new(),
        }
    }
}

impl<K: Object> Tracker<K> {
    pub fn observe(&mut self, event: Event<K>) -> Vec<Change<K>> {
        match event {
            Event::Applied(obj) => self.applied(obj).into_iter().collect(),
            Event::Deleted(obj) => {
                self.seen.remove(&key_of(&obj));
                vec![Change::Deleted(obj)]
            }
            Event::Restarted(objs) => {
                let mut previous = std::mem::take(&mut self.seen);
                let mut changes = Vec::with_capacity(objs.len());
                for obj in objs {
                    let key = key_of(&obj);
                    if let Some(old) = previous.remove(&key) {
                        self.seen.insert(key.clone(), old);
                    }
                    changes.extend(self.applied(obj));
                }
                changes.extend(previous.into_values().map(Change::Deleted));
                changes
            }
        }
    }

    fn applied(&mut self, obj: K) -> Option<Change<K>> {
        let key = key_of(&obj);
        match self.seen.insert(key, obj.clone()) {
            None => Some(Change::Created(obj)),
            Some(old) if old.resource_version().is_some()
                && old.resource_version() == obj.resource_version() =>
            {
                None
            }
            Some(old) => Some(Change::Updated { old, new: obj }),
        }
    }
}
