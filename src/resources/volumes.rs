//! Volume and mount construction.
//!
//! The accumulated volume/mount set is an explicit builder value threaded
//! through the assembly calls. User-declared storage volumes keep their
//! literal names (data already bound under those names must stay reachable);
//! config-map and secret mounts get content-addressed names so repeated
//! reconciliation cycles reuse the same derived volume for the same
//! declaration. Mount-path collisions anywhere in the unioned set are a
//! validation error raised before anything is written.

use crate::component::ComponentKind;
use crate::crd::{ConfigSourceRef, MountRef, StorageVolume};
use crate::error::{OperatorError, OperatorResult};
use crate::hash::derived_name;
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    SecretVolumeSource, Volume, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;
use std::collections::BTreeMap;

/// Storage class sentinel requesting a transient volume instead of a
/// persistent claim. Compared case-insensitively.
pub const EMPTY_DIR_STORAGE_CLASS: &str = "emptydir";

/// The hashable unit behind a derived volume name.
///
/// Hash input for [`derived_name`]; the field set and the type name are part
/// of the naming contract for already-deployed clusters and must not change.
#[derive(Debug, Clone, Serialize)]
pub struct MountInfo {
    /// Referenced object name.
    pub name: String,
    /// Mount path inside the container.
    pub mount_path: String,
    /// Sub-path within the referenced object.
    pub sub_path: Option<String>,
}

impl From<&MountRef> for MountInfo {
    fn from(reference: &MountRef) -> Self {
        MountInfo {
            name: reference.name.clone(),
            mount_path: reference.mount_path.clone(),
            sub_path: reference.sub_path.clone(),
        }
    }
}

/// Accumulated volumes, mounts, and claim templates for one pod.
#[derive(Debug, Clone)]
pub struct VolumeSet {
    kind: ComponentKind,
    volumes: Vec<Volume>,
    mounts: Vec<VolumeMount>,
    claims: Vec<PersistentVolumeClaim>,
}

impl VolumeSet {
    /// An empty set for one component.
    pub fn new(kind: ComponentKind) -> Self {
        VolumeSet {
            kind,
            volumes: Vec::new(),
            mounts: Vec::new(),
            claims: Vec::new(),
        }
    }

    /// Add user-declared storage volumes under their literal names.
    ///
    /// The sentinel storage class produces a transient emptyDir volume;
    /// anything else produces a volume claim template.
    pub fn with_storage(mut self, volumes: &[StorageVolume]) -> OperatorResult<Self> {
        for declared in volumes {
            self.claim_mount_path(&declared.mount_path)?;
            self.mounts.push(VolumeMount {
                name: declared.name.clone(),
                mount_path: declared.mount_path.clone(),
                sub_path: declared.sub_path.clone(),
                ..Default::default()
            });

            if is_transient(declared.storage_class_name.as_deref()) {
                self.volumes.push(Volume {
                    name: declared.name.clone(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                });
            } else {
                self.claims.push(claim_template(declared));
            }
        }
        Ok(self)
    }

    /// Mount the primary config reference under its literal ConfigMap name.
    pub fn with_primary_config(
        mut self,
        source: Option<&ConfigSourceRef>,
        mount_path: &str,
    ) -> OperatorResult<Self> {
        let Some(source) = source else {
            return Ok(self);
        };
        self.claim_mount_path(mount_path)?;
        self.mounts.push(VolumeMount {
            name: source.config_map_name.clone(),
            mount_path: mount_path.to_string(),
            ..Default::default()
        });
        self.volumes.push(Volume {
            name: source.config_map_name.clone(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some(source.config_map_name.clone()),
                ..Default::default()
            }),
            ..Default::default()
        });
        Ok(self)
    }

    /// Add ConfigMap mounts under content-addressed names.
    pub fn with_config_mounts(mut self, references: &[MountRef]) -> OperatorResult<Self> {
        for reference in references {
            let volume_name = self.derived_mount(reference)?;
            self.volumes.push(Volume {
                name: volume_name,
                config_map: Some(ConfigMapVolumeSource {
                    name: Some(reference.name.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
        Ok(self)
    }

    /// Add Secret mounts under content-addressed names.
    pub fn with_secret_mounts(mut self, references: &[MountRef]) -> OperatorResult<Self> {
        for reference in references {
            let volume_name = self.derived_mount(reference)?;
            self.volumes.push(Volume {
                name: volume_name,
                secret: Some(SecretVolumeSource {
                    secret_name: Some(reference.name.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }
        Ok(self)
    }

    /// Pod volumes (transient plus projected).
    pub fn volumes(&self) -> Vec<Volume> {
        self.volumes.clone()
    }

    /// Container volume mounts.
    pub fn mounts(&self) -> Vec<VolumeMount> {
        self.mounts.clone()
    }

    /// Volume claim templates for the workload controller.
    pub fn claims(&self) -> Vec<PersistentVolumeClaim> {
        self.claims.clone()
    }

    /// Register the derived mount for one reference, returning its volume
    /// name.
    fn derived_mount(&mut self, reference: &MountRef) -> OperatorResult<String> {
        self.claim_mount_path(&reference.mount_path)?;
        let volume_name = derived_name(&reference.name, &MountInfo::from(reference));
        self.mounts.push(VolumeMount {
            name: volume_name.clone(),
            mount_path: reference.mount_path.clone(),
            sub_path: reference.sub_path.clone(),
            ..Default::default()
        });
        Ok(volume_name)
    }

    /// Reject a mount path already taken by an earlier volume.
    fn claim_mount_path(&self, mount_path: &str) -> OperatorResult<()> {
        if self.mounts.iter().any(|mount| mount.mount_path == mount_path) {
            return Err(OperatorError::Validation {
                component: self.kind.to_string(),
                message: format!("duplicate mount path {:?}", mount_path),
            });
        }
        Ok(())
    }
}

fn is_transient(storage_class: Option<&str>) -> bool {
    storage_class
        .map(|class| class.eq_ignore_ascii_case(EMPTY_DIR_STORAGE_CLASS))
        .unwrap_or(false)
}

fn claim_template(declared: &StorageVolume) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), Quantity(declared.size.clone()));
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(declared.name.clone()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: declared.storage_class_name.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(name: &str, mount_path: &str, class: Option<&str>) -> StorageVolume {
        StorageVolume {
            name: name.to_string(),
            mount_path: mount_path.to_string(),
            sub_path: None,
            storage_class_name: class.map(|c| c.to_string()),
            size: "10Gi".to_string(),
        }
    }

    fn mount_ref(name: &str, mount_path: &str) -> MountRef {
        MountRef {
            name: name.to_string(),
            mount_path: mount_path.to_string(),
            sub_path: None,
        }
    }

    #[test]
    fn storage_volumes_keep_literal_names() {
        let set = VolumeSet::new(ComponentKind::Backend)
            .with_storage(&[storage("be-data", "/data", None)])
            .unwrap();
        assert_eq!(set.mounts()[0].name, "be-data");
        assert_eq!(set.claims()[0].metadata.name.as_deref(), Some("be-data"));
        assert!(set.volumes().is_empty());
    }

    #[test]
    fn sentinel_storage_class_is_transient_case_insensitive() {
        for class in ["emptydir", "EmptyDir", "EMPTYDIR"] {
            let set = VolumeSet::new(ComponentKind::Backend)
                .with_storage(&[storage("scratch", "/scratch", Some(class))])
                .unwrap();
            assert!(set.claims().is_empty());
            assert!(set.volumes()[0].empty_dir.is_some());
        }
    }

    #[test]
    fn config_mounts_get_derived_names() {
        let reference = mount_ref("fe-extra", "/etc/extra");
        let set = VolumeSet::new(ComponentKind::Frontend)
            .with_config_mounts(std::slice::from_ref(&reference))
            .unwrap();
        let name = &set.volumes()[0].name;
        assert!(name.starts_with("fe-extra-"));
        assert_ne!(name.as_str(), "fe-extra");
        assert_eq!(set.mounts()[0].name, *name);

        // The same declaration derives the same name on a fresh pass.
        let again = VolumeSet::new(ComponentKind::Frontend)
            .with_config_mounts(std::slice::from_ref(&reference))
            .unwrap();
        assert_eq!(again.volumes()[0].name, *name);
    }

    #[test]
    fn primary_config_mounts_by_literal_name() {
        let source = ConfigSourceRef {
            config_map_name: "fe-conf".to_string(),
            resolve_key: "basalt.conf".to_string(),
        };
        let set = VolumeSet::new(ComponentKind::Frontend)
            .with_primary_config(Some(&source), "/opt/basalt/conf")
            .unwrap();
        assert_eq!(set.volumes()[0].name, "fe-conf");
        assert_eq!(set.mounts()[0].mount_path, "/opt/basalt/conf");
    }

    #[test]
    fn duplicate_mount_path_is_a_validation_error() {
        let result = VolumeSet::new(ComponentKind::Backend).with_storage(&[
            storage("data-a", "/data", None),
            storage("data-b", "/data", None),
        ]);
        assert!(matches!(result, Err(OperatorError::Validation { .. })));
    }

    #[test]
    fn collision_detection_spans_volume_classes() {
        let result = VolumeSet::new(ComponentKind::Backend)
            .with_storage(&[storage("data", "/shared", None)])
            .and_then(|set| set.with_secret_mounts(&[mount_ref("tls", "/shared")]));
        assert!(matches!(result, Err(OperatorError::Validation { .. })));
    }

    #[test]
    fn claim_template_carries_size_and_class() {
        let set = VolumeSet::new(ComponentKind::Backend)
            .with_storage(&[storage("be-data", "/data", Some("fast-ssd"))])
            .unwrap();
        let claim = &set.claims()[0];
        let spec = claim.spec.as_ref().unwrap();
        assert_eq!(spec.storage_class_name.as_deref(), Some("fast-ssd"));
        let requests = spec
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
            .unwrap();
        assert_eq!(requests["storage"], Quantity("10Gi".to_string()));
    }
}
