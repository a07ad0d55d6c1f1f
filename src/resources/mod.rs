//! Desired-state computation for cluster components.
//!
//! Everything in this module is pure: given a component's declarative spec
//! and its resolved configuration, it computes the full set of objects the
//! reconciler wants to exist. The set is computed fresh on every pass and
//! either comes out whole or not at all; a failed assembly never leaves a
//! partial object set behind.

pub mod env;
pub mod labels;
pub mod pod;
pub mod ports;
pub mod probes;
pub mod security;
pub mod service;
pub mod volumes;
pub mod workload;

use crate::component::ComponentKind;
use crate::crd::ComponentSpec;
use crate::error::{OperatorError, OperatorResult};
use crate::resources::probes::ProbeMode;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::{BTreeMap, BTreeSet};

/// Annotation carrying the content hash of an object's desired spec.
///
/// The apply step compares this hash instead of structurally diffing
/// against server-populated fields.
pub const MANAGED_HASH_ANNOTATION: &str = "basalt.io/managed-hash";

/// The full desired object set for one component, for one pass.
#[derive(Debug, Clone)]
pub struct ComponentAssembly {
    /// Workload controller maintaining the replicas.
    pub statefulset: StatefulSet,
    /// Internal (headless) discovery service.
    pub internal_service: Service,
    /// Externally reachable service.
    pub external_service: Service,
}

impl ComponentAssembly {
    /// Names of the objects in apply order.
    pub fn resource_names(&self) -> Vec<String> {
        [
            &self.statefulset.metadata,
            &self.internal_service.metadata,
            &self.external_service.metadata,
        ]
        .iter()
        .filter_map(|meta| meta.name.clone())
        .collect()
    }
}

/// Structural validation of one component spec.
///
/// Runs before any derived object is computed and before anything is
/// written. Only malformed storage volumes, duplicate mount paths, a
/// negative replica count, and an invalid update strategy are errors;
/// absence of optional fields never is.
pub fn validate_component(kind: ComponentKind, spec: &ComponentSpec) -> OperatorResult<()> {
    if spec.replicas < 0 {
        return Err(OperatorError::Validation {
            component: kind.to_string(),
            message: format!("replicas must not be negative, got {}", spec.replicas),
        });
    }

    let mut mount_paths: BTreeSet<&str> = BTreeSet::new();
    for volume in &spec.storage_volumes {
        if volume.name.is_empty() {
            return Err(OperatorError::Validation {
                component: kind.to_string(),
                message: "storage volume with empty name".to_string(),
            });
        }
        if !volume.mount_path.starts_with('/') {
            return Err(OperatorError::Validation {
                component: kind.to_string(),
                message: format!(
                    "storage volume {:?} has non-absolute mount path {:?}",
                    volume.name, volume.mount_path
                ),
            });
        }
        if !mount_paths.insert(volume.mount_path.as_str()) {
            return Err(OperatorError::Validation {
                component: kind.to_string(),
                message: format!("duplicate mount path {:?}", volume.mount_path),
            });
        }
    }

    workload::validate_update_strategy(kind, spec)
}

/// Compute the full desired object set for one component.
pub fn build_component(
    cluster_meta: &ObjectMeta,
    kind: ComponentKind,
    spec: &ComponentSpec,
    config: &BTreeMap<String, String>,
    probe_mode: ProbeMode,
    owner: Option<OwnerReference>,
) -> OperatorResult<ComponentAssembly> {
    let cluster = cluster_meta
        .name
        .as_deref()
        .ok_or_else(|| OperatorError::InvalidCluster("cluster has no name".to_string()))?;
    let namespace = cluster_meta
        .namespace
        .as_deref()
        .ok_or_else(|| OperatorError::InvalidCluster("cluster must be namespaced".to_string()))?;

    let assembly = pod::build_pod_template(cluster_meta, kind, spec, config, probe_mode)?;
    let statefulset = workload::build_statefulset(
        cluster,
        namespace,
        kind,
        spec,
        &assembly,
        owner.clone(),
    );
    let internal_service =
        service::build_internal_service(cluster, namespace, kind, config, owner.clone());
    let external_service =
        service::build_external_service(cluster, namespace, kind, spec, config, owner);

    Ok(ComponentAssembly {
        statefulset,
        internal_service,
        external_service,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::StorageVolume;

    fn cluster_meta() -> ObjectMeta {
        ObjectMeta {
            name: Some("prod".to_string()),
            namespace: Some("db".to_string()),
            ..Default::default()
        }
    }

    fn component() -> ComponentSpec {
        serde_json::from_value(serde_json::json!({"image": "basalt/backend:3.3.9"})).unwrap()
    }

    #[test]
    fn assembly_names_are_deterministic() {
        let spec = component();
        let assembly = build_component(
            &cluster_meta(),
            ComponentKind::Backend,
            &spec,
            &BTreeMap::new(),
            ProbeMode::HttpGet,
            None,
        )
        .unwrap();
        assert_eq!(
            assembly.resource_names(),
            vec![
                "prod-backend",
                "prod-backend-internal",
                "prod-backend-service"
            ]
        );
    }

    #[test]
    fn validation_rejects_negative_replicas() {
        let mut spec = component();
        spec.replicas = -1;
        assert!(matches!(
            validate_component(ComponentKind::Backend, &spec),
            Err(OperatorError::Validation { .. })
        ));
    }

    #[test]
    fn validation_rejects_duplicate_storage_mounts() {
        let mut spec = component();
        let volume = StorageVolume {
            name: "data".to_string(),
            mount_path: "/data".to_string(),
            sub_path: None,
            storage_class_name: None,
            size: "1Gi".to_string(),
        };
        let mut second = volume.clone();
        second.name = "data2".to_string();
        spec.storage_volumes = vec![volume, second];
        assert!(matches!(
            validate_component(ComponentKind::Backend, &spec),
            Err(OperatorError::Validation { .. })
        ));
    }

    #[test]
    fn validation_rejects_relative_mount_path() {
        let mut spec = component();
        spec.storage_volumes = vec![StorageVolume {
            name: "data".to_string(),
            mount_path: "data".to_string(),
            sub_path: None,
            storage_class_name: None,
            size: "1Gi".to_string(),
        }];
        assert!(matches!(
            validate_component(ComponentKind::Backend, &spec),
            Err(OperatorError::Validation { .. })
        ));
    }

    #[test]
    fn validation_accepts_minimal_spec() {
        assert!(validate_component(ComponentKind::Backend, &component()).is_ok());
    }

    #[test]
    fn cluster_without_namespace_fails_assembly() {
        let meta = ObjectMeta {
            name: Some("prod".to_string()),
            ..Default::default()
        };
        let result = build_component(
            &meta,
            ComponentKind::Backend,
            &component(),
            &BTreeMap::new(),
            ProbeMode::HttpGet,
            None,
        );
        assert!(matches!(result, Err(OperatorError::InvalidCluster(_))));
    }
}
