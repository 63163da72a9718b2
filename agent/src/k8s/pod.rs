use k8s_openapi::api::core::v1::Pod;

pub const TERMINATING_STATE: &str = "Terminating";
pub const UNKNOWN_STATE: &str = "Unknown";

const SUCCEEDED_PHASE: &str = "Succeeded";

/// Summarizes a pod's lifecycle the way `kubectl get pods` shows it in the STATUS column.
pub fn state(pod: &Pod) -> String {
    if pod.metadata.deletion_timestamp.is_some() {
        return TERMINATING_STATE.to_string();
    }

    let Some(status) = &pod.status else {
        return UNKNOWN_STATE.to_string();
    };
    let phase = status.phase.as_deref().unwrap_or(UNKNOWN_STATE);

    let container_states = status
        .container_statuses
        .iter()
        .flatten()
        .filter_map(|cs| cs.state.as_ref());

    for cs in container_states {
        if let Some(reason) = cs.waiting.as_ref().and_then(|w| w.reason.as_deref()) {
            return reason.to_string();
        }
        if phase != SUCCEEDED_PHASE {
            if let Some(reason) = cs.terminated.as_ref().and_then(|t| t.reason.as_deref()) {
                return reason.to_string();
            }
        }
    }

    phase.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateTerminated, ContainerStateWaiting, ContainerStatus,
        PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn with_status(phase: &str, states: Vec<ContainerState>) -> Pod {
        Pod {
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                container_statuses: Some(
                    states
                        .into_iter()
                        .map(|state| ContainerStatus {
                            name: "main".to_string(),
                            state: Some(state),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn waiting(reason: &str) -> ContainerState {
        ContainerState {
            waiting: Some(ContainerStateWaiting {
                reason: Some(reason.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn terminated(reason: &str) -> ContainerState {
        ContainerState {
            terminated: Some(ContainerStateTerminated {
                reason: Some(reason.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn phase_is_used_for_healthy_pods() {
        assert_eq!(state(&with_status("Running", vec![])), "Running");
        assert_eq!(state(&with_status("Pending", vec![])), "Pending");
    }

    #[test]
    fn missing_status_is_unknown() {
        assert_eq!(state(&Pod::default()), UNKNOWN_STATE);
    }

    #[test]
    fn waiting_reason_wins() {
        let pod = with_status("Running", vec![waiting("CrashLoopBackOff")]);
        assert_eq!(state(&pod), "CrashLoopBackOff");
    }

    #[test]
    fn terminated_reason_is_ignored_once_succeeded() {
        let failed = with_status("Failed", vec![terminated("OOMKilled")]);
        assert_eq!(state(&failed), "OOMKilled");

        let done = with_status("Succeeded", vec![terminated("Completed")]);
        assert_eq!(state(&done), "Succeeded");
    }

    #[test]
    fn deletion_means_terminating() {
        let mut pod = with_status("Running", vec![]);
        pod.metadata.deletion_timestamp = Some(Time(k8s_openapi::chrono::Utc::now()));
        assert_eq!(state(&pod), TERMINATING_STATE);
    }
}
