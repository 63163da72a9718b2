use super::{ClusterState, WorkloadId};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use log::{debug, warn};

pub const REPLICA_SET_KIND: &str = "ReplicaSet";
pub const DEPLOYMENT_KIND: &str = "Deployment";

/// Finds the workload a pod belongs to.
///
/// Only pods with exactly one owner take part in the topology. A `ReplicaSet` owner is followed
/// one more hop and must itself be owned by a single `Deployment`; any other owner kind is
/// the workload.
pub fn resolve(pod: &Pod, cluster: &dyn ClusterState) -> Option<WorkloadId> {
    let [owner] = pod.owner_references() else {
        debug!(
            "pod {} has {} owners, not tracking it",
            pod.name_any(),
            pod.owner_references().len()
        );
        return None;
    };

    if owner.kind != REPLICA_SET_KIND {
        return Some(WorkloadId::new(&owner.kind, &owner.name));
    }

    let namespace = pod.namespace().unwrap_or_default();
    let rs = match cluster.replica_set(&namespace, &owner.name) {
        Ok(rs) => rs,
        Err(e) => {
            warn!("get replicaset failed: {}", e);
            return None;
        }
    };

    let [parent] = rs.owner_references() else {
        warn!(
            "replicaset {}/{} has {} owners",
            namespace,
            owner.name,
            rs.owner_references().len()
        );
        return None;
    };

    if parent.kind != DEPLOYMENT_KIND {
        warn!(
            "replicaset {}/{} parent is not a deployment but {}",
            namespace, owner.name, parent.kind
        );
        return None;
    }

    Some(WorkloadId::new(&parent.kind, &parent.name))
}
