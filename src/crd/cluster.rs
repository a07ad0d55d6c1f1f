//! BasaltCluster Custom Resource Definition.
//!
//! Declares a Basalt database cluster in Kubernetes. The operator derives a
//! StatefulSet and up to two Services per enabled component (frontend,
//! backend, compute, observer) from this resource. A component's spec is
//! immutable input for one reconciliation pass: the engine only derives
//! objects from it, never mutates it.

use crate::component::ComponentKind;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// BasaltCluster is the Schema for the basaltclusters API.
///
/// Each sub-component is optional; an absent component is disabled and the
/// operator neither creates nor tears down objects for it.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "basalt.io",
    version = "v1alpha1",
    kind = "BasaltCluster",
    plural = "basaltclusters",
    shortname = "bc",
    namespaced,
    status = "BasaltClusterStatus",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Frontend", "type":"string", "jsonPath":".status.frontend.phase"}"#,
    printcolumn = r#"{"name":"Backend", "type":"string", "jsonPath":".status.backend.phase"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BasaltClusterSpec {
    /// Frontend (query coordination and metadata) component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend: Option<ComponentSpec>,

    /// Backend (storage and execution) component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<ComponentSpec>,

    /// Compute (stateless execution) component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute: Option<ComponentSpec>,

    /// Observer (read-only metadata follower) component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observer: Option<ComponentSpec>,
}

impl BasaltClusterSpec {
    /// The spec of one sub-component, if enabled.
    pub fn component(&self, kind: ComponentKind) -> Option<&ComponentSpec> {
        match kind {
            ComponentKind::Frontend => self.frontend.as_ref(),
            ComponentKind::Backend => self.backend.as_ref(),
            ComponentKind::Compute => self.compute.as_ref(),
            ComponentKind::Observer => self.observer.as_ref(),
        }
    }
}

/// Declarative configuration of one cluster sub-component.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Image to run, including tag. The tag gates version-dependent behavior.
    pub image: String,

    /// Number of replicas.
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Image pull policy.
    #[serde(default = "default_image_pull_policy")]
    pub image_pull_policy: String,

    /// Service account name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    /// Resource requirements for each pod.
    #[serde(default)]
    pub resources: ResourceRequirementsSpec,

    /// User-declared storage volumes. These keep their literal names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage_volumes: Vec<StorageVolume>,

    /// Primary configuration source: a ConfigMap key holding the component's
    /// `key = value` configuration document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSourceRef>,

    /// Additional ConfigMaps mounted into the pod under derived names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_mounts: Vec<MountRef>,

    /// Secrets mounted into the pod under derived names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_mounts: Vec<MountRef>,

    /// Environment variable overrides. User-declared names win over engine
    /// defaults of the same name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVarSpec>,

    /// Non-root identity to run the managed process under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_as: Option<RunAsIdentity>,

    /// Node selector for pod placement.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Tolerations for pod scheduling.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// StatefulSet update strategy: RollingUpdate (default) or OnDelete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_strategy: Option<String>,

    /// Externally reachable service settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ExternalServiceSpec>,

    /// Startup probe window in seconds, converted to whole probe periods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_probe_failure_seconds: Option<i32>,

    /// Liveness probe window in seconds, converted to whole probe periods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liveness_probe_failure_seconds: Option<i32>,

    /// Readiness probe window in seconds, converted to whole probe periods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness_probe_failure_seconds: Option<i32>,

    /// Additional labels for pods of this component.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pod_labels: BTreeMap<String, String>,

    /// Additional annotations for pods of this component.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pod_annotations: BTreeMap<String, String>,
}

fn default_replicas() -> i32 {
    1
}

fn default_image_pull_policy() -> String {
    "IfNotPresent".to_string()
}

/// Reference to the ConfigMap key holding a component's configuration
/// document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSourceRef {
    /// Name of the ConfigMap.
    pub config_map_name: String,

    /// Key within the ConfigMap whose value is parsed as `key = value`
    /// configuration.
    #[serde(default = "default_resolve_key")]
    pub resolve_key: String,
}

fn default_resolve_key() -> String {
    "basalt.conf".to_string()
}

/// A ConfigMap or Secret mounted into the pod.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MountRef {
    /// Name of the referenced ConfigMap or Secret.
    pub name: String,

    /// Mount path inside the container.
    pub mount_path: String,

    /// Sub-path within the referenced object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
}

/// A user-declared storage volume.
///
/// Storage volumes keep their literal names so data already bound under that
/// name stays reachable across operator upgrades.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageVolume {
    /// Volume name.
    pub name: String,

    /// Mount path inside the container. Must be unique across all volumes
    /// attached to one pod.
    pub mount_path: String,

    /// Sub-path within the volume.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,

    /// Storage class. The sentinel value `emptydir` (case-insensitive)
    /// requests a transient volume instead of a persistent claim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,

    /// Requested size (e.g. "10Gi"). Ignored for transient volumes.
    #[serde(default = "default_storage_size")]
    pub size: String,
}

fn default_storage_size() -> String {
    "10Gi".to_string()
}

/// An environment variable entry.
///
/// Platform-resolved values (pod name, pod IP) are field references resolved
/// by Kubernetes at pod start, not by this engine, so the source is a tagged
/// variant rather than a plain string.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSpec {
    /// Variable name.
    pub name: String,

    /// Where the value comes from.
    #[serde(flatten)]
    pub value: EnvValue,
}

/// Source of an environment variable's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum EnvValue {
    /// A literal value.
    Value(String),
    /// A downward-API field path (e.g. `metadata.name`), resolved by the
    /// platform when the pod starts.
    FieldRef(String),
}

impl EnvVarSpec {
    /// Convenience constructor for a literal variable.
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        EnvVarSpec {
            name: name.into(),
            value: EnvValue::Value(value.into()),
        }
    }

    /// Convenience constructor for a field-reference variable.
    pub fn field_ref(name: impl Into<String>, path: impl Into<String>) -> Self {
        EnvVarSpec {
            name: name.into(),
            value: EnvValue::FieldRef(path.into()),
        }
    }
}

/// Non-root identity the managed process runs under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunAsIdentity {
    /// User id.
    pub uid: i64,

    /// Group id. Also used as the pod's fsGroup.
    pub gid: i64,
}

/// Resource requirements (requests and limits).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirementsSpec {
    /// Resource requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceSpec>,

    /// Resource limits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceSpec>,
}

/// Resource specification (CPU and memory).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// CPU (e.g. "1", "500m").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory (e.g. "1Gi", "512Mi").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Kubernetes toleration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    /// Taint key to match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Operator (Equal or Exists).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    /// Taint value to match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Effect (NoSchedule, PreferNoSchedule, NoExecute).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,

    /// Toleration seconds for NoExecute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

/// Externally reachable service settings for a component.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalServiceSpec {
    /// Service type: ClusterIP, NodePort, or LoadBalancer.
    #[serde(default = "default_service_type")]
    pub service_type: String,

    /// Load balancer IP, when the type supports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_ip: Option<String>,

    /// Additional annotations for the service object.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

fn default_service_type() -> String {
    "ClusterIP".to_string()
}

/// BasaltCluster status.
///
/// Serialized without field skipping: the status is written as a JSON merge
/// patch, where an absent key keeps its old value and only an explicit null
/// clears one. A removed component must serialize as null to be cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BasaltClusterStatus {
    /// Summary phase across all enabled components.
    #[serde(default)]
    pub phase: ClusterPhase,

    /// Frontend component status. Absent while the component has never
    /// synced or has been removed from the spec.
    #[serde(default)]
    pub frontend: Option<ComponentStatus>,

    /// Backend component status.
    #[serde(default)]
    pub backend: Option<ComponentStatus>,

    /// Compute component status.
    #[serde(default)]
    pub compute: Option<ComponentStatus>,

    /// Observer component status.
    #[serde(default)]
    pub observer: Option<ComponentStatus>,

    /// Generation observed by the last reconciliation.
    #[serde(default)]
    pub observed_generation: Option<i64>,

    /// Last time the status was updated.
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl BasaltClusterStatus {
    /// Status of one sub-component, if recorded.
    pub fn component(&self, kind: ComponentKind) -> Option<&ComponentStatus> {
        match kind {
            ComponentKind::Frontend => self.frontend.as_ref(),
            ComponentKind::Backend => self.backend.as_ref(),
            ComponentKind::Compute => self.compute.as_ref(),
            ComponentKind::Observer => self.observer.as_ref(),
        }
    }

    /// Replace one sub-component's status.
    pub fn set_component(&mut self, kind: ComponentKind, status: Option<ComponentStatus>) {
        match kind {
            ComponentKind::Frontend => self.frontend = status,
            ComponentKind::Backend => self.backend = status,
            ComponentKind::Compute => self.compute = status,
            ComponentKind::Observer => self.observer = status,
        }
    }
}

/// Summary phase of the whole cluster.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ClusterPhase {
    /// At least one component is still converging.
    #[default]
    Reconciling,
    /// All enabled components are running.
    Running,
    /// At least one component has failed pods.
    Failed,
    /// The cluster is being deleted.
    Deleting,
}

/// Per-component phase.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ComponentPhase {
    /// Pods are being created or are not yet ready.
    #[default]
    Reconciling,
    /// All pods are ready at the declared replica count.
    Running,
    /// One or more pods are in a terminal failed state.
    Failed,
}

/// Status of one sub-component.
///
/// Created on the first successful Sync, updated by UpdateStatus, and
/// cleared when the component is removed from the cluster spec. Fields are
/// never skipped when serializing, for the same merge-patch reason as
/// [`BasaltClusterStatus`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    /// Current phase.
    #[serde(default)]
    pub phase: ComponentPhase,

    /// Why the component is not Running, when it is not.
    #[serde(default)]
    pub reason: Option<String>,

    /// Name of the internal discovery service.
    #[serde(default)]
    pub service_name: Option<String>,

    /// Names of the objects the operator manages for this component.
    #[serde(default)]
    pub resource_names: Vec<String>,

    /// Pods that pass the readiness predicate.
    #[serde(default)]
    pub ready_instances: Vec<String>,

    /// Pods still coming up.
    #[serde(default)]
    pub creating_instances: Vec<String>,

    /// Pods in a terminal failed state.
    #[serde(default)]
    pub failed_instances: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_component(image: &str) -> ComponentSpec {
        ComponentSpec {
            image: image.to_string(),
            replicas: default_replicas(),
            image_pull_policy: default_image_pull_policy(),
            service_account: None,
            resources: ResourceRequirementsSpec::default(),
            storage_volumes: vec![],
            config: None,
            config_mounts: vec![],
            secret_mounts: vec![],
            env: vec![],
            run_as: None,
            node_selector: Default::default(),
            tolerations: vec![],
            update_strategy: None,
            service: None,
            startup_probe_failure_seconds: None,
            liveness_probe_failure_seconds: None,
            readiness_probe_failure_seconds: None,
            pod_labels: Default::default(),
            pod_annotations: Default::default(),
        }
    }

    #[test]
    fn component_accessor_matches_fields() {
        let spec = BasaltClusterSpec {
            frontend: Some(minimal_component("basalt/frontend:3.4.1")),
            backend: None,
            compute: None,
            observer: None,
        };

        assert!(spec.component(ComponentKind::Frontend).is_some());
        assert!(spec.component(ComponentKind::Backend).is_none());
        assert!(spec.component(ComponentKind::Observer).is_none());
    }

    #[test]
    fn env_var_serialization_is_tagged() {
        let literal = EnvVarSpec::literal("JAVA_OPTS", "-Xmx4g");
        let json = serde_json::to_value(&literal).unwrap();
        assert_eq!(json["name"], "JAVA_OPTS");
        assert_eq!(json["value"], "-Xmx4g");

        let field = EnvVarSpec::field_ref("POD_NAME", "metadata.name");
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["fieldRef"], "metadata.name");
    }

    #[test]
    fn env_var_round_trip() {
        let input = serde_json::json!({"name": "POD_IP", "fieldRef": "status.podIP"});
        let parsed: EnvVarSpec = serde_json::from_value(input).unwrap();
        assert_eq!(parsed.value, EnvValue::FieldRef("status.podIP".to_string()));
    }

    #[test]
    fn status_component_round_trip() {
        let mut status = BasaltClusterStatus::default();
        status.set_component(
            ComponentKind::Backend,
            Some(ComponentStatus {
                phase: ComponentPhase::Running,
                ..Default::default()
            }),
        );

        assert!(status.component(ComponentKind::Backend).is_some());
        assert!(status.component(ComponentKind::Frontend).is_none());

        status.set_component(ComponentKind::Backend, None);
        assert!(status.component(ComponentKind::Backend).is_none());
    }

    #[test]
    fn component_spec_defaults() {
        let json = serde_json::json!({"image": "basalt/backend:3.3.9"});
        let spec: ComponentSpec = serde_json::from_value(json).unwrap();
        assert_eq!(spec.replicas, 1);
        assert_eq!(spec.image_pull_policy, "IfNotPresent");
        assert!(spec.storage_volumes.is_empty());
    }
}
