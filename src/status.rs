//! Aggregation of live pod state into status buckets.
//!
//! UpdateStatus reduces the pods belonging to one component into three
//! buckets: ready (passes the platform readiness predicate), creating
//! (Running or Pending but not yet ready), and failed (everything else,
//! including Succeeded: a database process that exits is not healthy).
//! Every pod lands in exactly one bucket and input order is preserved.

use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;

/// Pod names partitioned by observed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodBuckets {
    /// Pods still coming up (Running or Pending, not yet ready).
    pub creating: Vec<String>,
    /// Pods passing the readiness predicate.
    pub ready: Vec<String>,
    /// Pods in any other phase (Succeeded, Failed, Unknown).
    pub failed: Vec<String>,
}

/// Per-pod phase and reason, for inspection without classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSummary {
    /// Pod phase as reported by the platform.
    pub phase: String,
    /// Reason accompanying the phase, if any.
    pub reason: Option<String>,
}

/// Whether the pod passes the platform's readiness predicate
/// (a `Ready` condition with status `True`).
pub fn is_pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// Partition pods into creating / ready / failed buckets.
pub fn count(pods: &[Pod]) -> PodBuckets {
    let mut buckets = PodBuckets::default();
    for pod in pods {
        let name = pod.metadata.name.clone().unwrap_or_default();
        let phase = pod
            .status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            .unwrap_or("Unknown");

        if is_pod_ready(pod) {
            buckets.ready.push(name);
        } else if phase == "Running" || phase == "Pending" {
            buckets.creating.push(name);
        } else {
            buckets.failed.push(name);
        }
    }
    buckets
}

/// Per-pod `{phase, reason}` map keyed by pod name.
pub fn pod_statuses(pods: &[Pod]) -> BTreeMap<String, PodSummary> {
    pods.iter()
        .map(|pod| {
            let name = pod.metadata.name.clone().unwrap_or_default();
            let (phase, reason) = pod
                .status
                .as_ref()
                .map(|status| {
                    (
                        status.phase.clone().unwrap_or_else(|| "Unknown".to_string()),
                        status.reason.clone(),
                    )
                })
                .unwrap_or_else(|| ("Unknown".to_string(), None));
            (name, PodSummary { phase, reason })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn mock_pod(name: &str, phase: &str, ready: bool) -> Pod {
        let conditions = ready.then(|| {
            vec![PodCondition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }]
        });
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                conditions,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn every_pod_lands_in_exactly_one_bucket() {
        let pods = vec![
            mock_pod("pod-0", "Running", false),
            mock_pod("pod-1", "Running", true),
            mock_pod("pod-2", "Failed", false),
        ];

        let buckets = count(&pods);
        assert_eq!(buckets.creating, vec!["pod-0"]);
        assert_eq!(buckets.ready, vec!["pod-1"]);
        assert_eq!(buckets.failed, vec!["pod-2"]);
    }

    #[test]
    fn pending_pods_are_creating() {
        let buckets = count(&[mock_pod("pod-0", "Pending", false)]);
        assert_eq!(buckets.creating, vec!["pod-0"]);
        assert!(buckets.ready.is_empty());
        assert!(buckets.failed.is_empty());
    }

    #[test]
    fn succeeded_and_unknown_pods_are_failed() {
        let buckets = count(&[
            mock_pod("pod-0", "Succeeded", false),
            mock_pod("pod-1", "Unknown", false),
        ]);
        assert_eq!(buckets.failed, vec!["pod-0", "pod-1"]);
    }

    #[test]
    fn buckets_preserve_input_order() {
        let pods = vec![
            mock_pod("pod-2", "Running", true),
            mock_pod("pod-0", "Running", true),
            mock_pod("pod-1", "Running", true),
        ];
        let buckets = count(&pods);
        assert_eq!(buckets.ready, vec!["pod-2", "pod-0", "pod-1"]);
    }

    #[test]
    fn empty_input_yields_empty_buckets() {
        let buckets = count(&[]);
        assert_eq!(buckets, PodBuckets::default());
    }

    #[test]
    fn pod_statuses_expose_phase_and_reason() {
        let mut pod = mock_pod("pod-0", "Failed", false);
        if let Some(status) = pod.status.as_mut() {
            status.reason = Some("Evicted".to_string());
        }

        let statuses = pod_statuses(&[pod]);
        let summary = &statuses["pod-0"];
        assert_eq!(summary.phase, "Failed");
        assert_eq!(summary.reason.as_deref(), Some("Evicted"));
    }

    #[test]
    fn pod_without_status_is_unknown_and_failed() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("pod-0".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let buckets = count(std::slice::from_ref(&pod));
        assert_eq!(buckets.failed, vec!["pod-0"]);

        let statuses = pod_statuses(&[pod]);
        assert_eq!(statuses["pod-0"].phase, "Unknown");
    }
}
