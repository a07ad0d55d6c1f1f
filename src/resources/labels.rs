//! Label and annotation construction for derived objects.

use crate::component::ComponentKind;
use crate::crd::ComponentSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Value of the `app.kubernetes.io/name` label on every derived object.
pub const APP_NAME: &str = "basalt";

const LABEL_NAME: &str = "app.kubernetes.io/name";
const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
const LABEL_COMPONENT: &str = "app.kubernetes.io/component";

/// Selector labels identifying one component's pods.
///
/// These are the labels the workload selector, the services, and the status
/// pod listing all agree on; they must stay stable across reconciliations.
pub fn selector_labels(cluster: &str, kind: ComponentKind) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_NAME.to_string(), APP_NAME.to_string());
    labels.insert(LABEL_INSTANCE.to_string(), cluster.to_string());
    labels.insert(LABEL_COMPONENT.to_string(), kind.as_str().to_string());
    labels
}

/// The label selector string for listing one component's pods.
pub fn selector_string(cluster: &str, kind: ComponentKind) -> String {
    format!(
        "{}={},{}={},{}={}",
        LABEL_NAME,
        APP_NAME,
        LABEL_INSTANCE,
        cluster,
        LABEL_COMPONENT,
        kind.as_str()
    )
}

/// Pod template labels: selector labels plus user-declared pod labels.
///
/// User labels are added on top but cannot displace the selector keys;
/// those must match the workload selector or the controller would orphan
/// its own pods.
pub fn pod_labels(
    cluster: &str,
    kind: ComponentKind,
    spec: &ComponentSpec,
) -> BTreeMap<String, String> {
    let mut labels: BTreeMap<String, String> = spec.pod_labels.clone();
    labels.extend(selector_labels(cluster, kind));
    labels
}

/// Pod template annotations.
///
/// Carries the cluster's component restart marker only when the cluster
/// metadata declares one, then user-declared annotations (user values win on
/// key collision, last write in merge order).
pub fn pod_annotations(
    cluster_meta: &ObjectMeta,
    kind: ComponentKind,
    spec: &ComponentSpec,
) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    let marker_key = kind.restart_marker_key();
    if let Some(value) = cluster_meta
        .annotations
        .as_ref()
        .and_then(|all| all.get(&marker_key))
    {
        annotations.insert(marker_key, value.clone());
    }
    annotations.extend(spec.pod_annotations.clone());
    annotations
}
