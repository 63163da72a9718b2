use serde::Serialize;
use std::collections::BTreeMap;

/// Identifies a workload by the kind and name of the resource owning its pods.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadId {
    pub kind: String,
    pub name: String,
}

impl WorkloadId {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pod {
    pub name: String,
    pub state: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Workload {
    pub kind: String,
    pub name: String,
    pub pods: Vec<Pod>,
}

impl Workload {
    pub fn new(id: &WorkloadId) -> Self {
        Self {
            kind: id.kind.clone(),
            name: id.name.clone(),
            pods: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn id(&self) -> WorkloadId {
        WorkloadId::new(&self.kind, &self.name)
    }

    fn upsert(&mut self, pod: Pod) {
        match self.pods.iter_mut().find(|p| p.name == pod.name) {
            Some(existing) => *existing = pod,
            None => self.pods.push(pod),
        }
    }
}

/// Workloads that currently have at least one pod.
#[derive(Debug, Default)]
pub struct Workloads {
    by_id: BTreeMap<WorkloadId, Workload>,
}

impl Workloads {
    pub fn get(&self, id: &WorkloadId) -> Option<&Workload> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &WorkloadId) -> bool {
        self.by_id.contains_key(id)
    }

    #[cfg(test)]
    pub fn add(&mut self, workload: Workload) {
        if workload.pods.is_empty() {
            return;
        }
        self.by_id.insert(workload.id(), workload);
    }

    /// Inserts or refreshes `pod`, creating the workload if needed.
    pub fn add_pod(&mut self, id: &WorkloadId, pod: Pod) {
        self.by_id
            .entry(id.clone())
            .or_insert_with(|| Workload::new(id))
            .upsert(pod);
    }

    /// Removes the named pod. The workload itself is dropped with its last pod.
    pub fn remove_pod(&mut self, id: &WorkloadId, pod_name: &str) -> bool {
        let Some(workload) = self.by_id.get_mut(id) else {
            return false;
        };
        let Some(idx) = workload.pods.iter().position(|p| p.name == pod_name) else {
            return false;
        };
        workload.pods.remove(idx);
        if workload.pods.is_empty() {
            self.delete(id);
        }
        true
    }

    pub fn delete(&mut self, id: &WorkloadId) -> Option<Workload> {
        self.by_id.remove(id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(name: &str, state: &str) -> Pod {
        Pod {
            name: name.to_string(),
            state: state.to_string(),
        }
    }

    #[test]
    fn add_pod_replaces_in_place() {
        let id = WorkloadId::new("Deployment", "web");
        let mut workloads = Workloads::default();
        workloads.add_pod(&id, pod("web-1", "Pending"));
        workloads.add_pod(&id, pod("web-2", "Running"));
        workloads.add_pod(&id, pod("web-1", "Running"));

        let wl = workloads.get(&id).unwrap();
        assert_eq!(wl.pods, vec![pod("web-1", "Running"), pod("web-2", "Running")]);
    }

    #[test]
    fn last_pod_removal_drops_workload() {
        let id = WorkloadId::new("StatefulSet", "db");
        let mut workloads = Workloads::default();
        workloads.add_pod(&id, pod("db-0", "Running"));
        workloads.add_pod(&id, pod("db-1", "Running"));

        assert!(workloads.remove_pod(&id, "db-0"));
        assert!(workloads.get(&id).is_some());
        assert!(workloads.remove_pod(&id, "db-1"));
        assert!(workloads.get(&id).is_none());
        assert!(workloads.is_empty());

        assert!(!workloads.remove_pod(&id, "db-1"));
    }

    #[test]
    fn kinds_do_not_collide() {
        let mut workloads = Workloads::default();
        workloads.add_pod(&WorkloadId::new("Deployment", "app"), pod("a", "Running"));
        workloads.add_pod(&WorkloadId::new("DaemonSet", "app"), pod("b", "Running"));
        assert_eq!(workloads.len(), 2);

        workloads.delete(&WorkloadId::new("Deployment", "app"));
        assert!(workloads.contains(&WorkloadId::new("DaemonSet", "app")));
    }

    #[test]
    fn empty_workloads_are_not_added() {
        let mut workloads = Workloads::default();
        workloads.add(Workload::new(&WorkloadId::new("Job", "once")));
        assert!(workloads.is_empty());
    }
}
