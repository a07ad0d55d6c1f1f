//! Workload controller (StatefulSet) construction.

use crate::component::ComponentKind;
use crate::crd::ComponentSpec;
use crate::error::{OperatorError, OperatorResult};
use crate::hash::hash_object;
use crate::resources::pod::PodAssembly;
use crate::resources::{labels, MANAGED_HASH_ANNOTATION};
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec, StatefulSetUpdateStrategy};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};

/// Update strategies a component may declare.
const VALID_UPDATE_STRATEGIES: &[&str] = &["RollingUpdate", "OnDelete"];

/// Validate a declared update strategy.
pub fn validate_update_strategy(kind: ComponentKind, spec: &ComponentSpec) -> OperatorResult<()> {
    if let Some(strategy) = spec.update_strategy.as_deref() {
        if !VALID_UPDATE_STRATEGIES.contains(&strategy) {
            return Err(OperatorError::Validation {
                component: kind.to_string(),
                message: format!(
                    "invalid update strategy {:?}, expected one of {:?}",
                    strategy, VALID_UPDATE_STRATEGIES
                ),
            });
        }
    }
    Ok(())
}

/// Build the StatefulSet for one component.
///
/// The object carries a content hash of its desired spec in the
/// managed-hash annotation; the apply step compares that hash instead of
/// diffing server-populated fields.
pub fn build_statefulset(
    cluster: &str,
    namespace: &str,
    kind: ComponentKind,
    spec: &ComponentSpec,
    assembly: &PodAssembly,
    owner: Option<OwnerReference>,
) -> StatefulSet {
    let selector = labels::selector_labels(cluster, kind);
    let sts_spec = StatefulSetSpec {
        replicas: Some(spec.replicas),
        selector: LabelSelector {
            match_labels: Some(selector.clone()),
            ..Default::default()
        },
        service_name: kind.internal_service_name(cluster),
        template: assembly.template.clone(),
        update_strategy: Some(StatefulSetUpdateStrategy {
            type_: Some(
                spec.update_strategy
                    .clone()
                    .unwrap_or_else(|| "RollingUpdate".to_string()),
            ),
            ..Default::default()
        }),
        volume_claim_templates: (!assembly.claims.is_empty()).then(|| assembly.claims.clone()),
        ..Default::default()
    };

    let mut annotations = std::collections::BTreeMap::new();
    annotations.insert(MANAGED_HASH_ANNOTATION.to_string(), hash_object(&sts_spec));

    StatefulSet {
        metadata: ObjectMeta {
            name: Some(kind.workload_name(cluster)),
            namespace: Some(namespace.to_string()),
            labels: Some(selector),
            annotations: Some(annotations),
            owner_references: owner.map(|reference| vec![reference]),
            ..Default::default()
        },
        spec: Some(sts_spec),
        ..Default::default()
    }
}
