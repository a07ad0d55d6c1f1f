//! Pod template assembly for one component.

use crate::component::ComponentKind;
use crate::crd::{ComponentSpec, ResourceRequirementsSpec, ResourceSpec};
use crate::error::{OperatorError, OperatorResult};
use crate::resources::{env, labels, ports, probes, security, volumes::VolumeSet};
use k8s_openapi::api::core::v1::{
    Container, PersistentVolumeClaim, PodSpec, PodTemplateSpec, ResourceRequirements, Toleration,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// A computed pod template plus the claim templates its mounts require.
#[derive(Debug, Clone)]
pub struct PodAssembly {
    /// The pod template for the workload controller.
    pub template: PodTemplateSpec,
    /// Volume claim templates backing the declared storage volumes.
    pub claims: Vec<PersistentVolumeClaim>,
}

/// Assemble the complete pod template for one component.
///
/// Pure: derives everything from the inputs and never mutates them.
pub fn build_pod_template(
    cluster_meta: &ObjectMeta,
    kind: ComponentKind,
    spec: &ComponentSpec,
    config: &BTreeMap<String, String>,
    probe_mode: probes::ProbeMode,
) -> OperatorResult<PodAssembly> {
    let cluster = cluster_meta
        .name
        .as_deref()
        .ok_or_else(|| OperatorError::InvalidCluster("cluster has no name".to_string()))?;
    let namespace = cluster_meta.namespace.as_deref().unwrap_or("default");

    let root = env::resolved_root(spec);
    let conf_dir = format!("{}/conf", root.trim_end_matches('/'));
    let volume_set = VolumeSet::new(kind)
        .with_storage(&spec.storage_volumes)?
        .with_primary_config(spec.config.as_ref(), &conf_dir)?
        .with_config_mounts(&spec.config_mounts)?
        .with_secret_mounts(&spec.secret_mounts)?;

    let primary_port = ports::primary_port(kind, config);
    let container = Container {
        name: kind.as_str().to_string(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some(spec.image_pull_policy.clone()),
        ports: Some(ports::container_ports(kind, config)),
        env: Some(env::build_env(kind, cluster, namespace, spec, config)),
        volume_mounts: Some(volume_set.mounts()),
        startup_probe: Some(probes::startup_probe(
            primary_port,
            probe_mode,
            spec.startup_probe_failure_seconds,
        )),
        liveness_probe: Some(probes::liveness_probe(
            primary_port,
            probe_mode,
            spec.liveness_probe_failure_seconds,
        )),
        readiness_probe: Some(probes::readiness_probe(
            primary_port,
            probe_mode,
            spec.readiness_probe_failure_seconds,
        )),
        lifecycle: Some(probes::lifecycle(&root)),
        security_context: Some(security::container_security_context(spec.run_as.as_ref())),
        resources: to_resource_requirements(&spec.resources),
        ..Default::default()
    };

    let pod_spec = PodSpec {
        containers: vec![container],
        volumes: non_empty(volume_set.volumes()),
        security_context: security::pod_security_context(spec.run_as.as_ref()),
        node_selector: (!spec.node_selector.is_empty()).then(|| spec.node_selector.clone()),
        tolerations: non_empty(spec.tolerations.iter().map(to_toleration).collect()),
        service_account_name: spec.service_account.clone(),
        ..Default::default()
    };

    let template = PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels::pod_labels(cluster, kind, spec)),
            annotations: non_empty_map(labels::pod_annotations(cluster_meta, kind, spec)),
            ..Default::default()
        }),
        spec: Some(pod_spec),
    };

    Ok(PodAssembly {
        template,
        claims: volume_set.claims(),
    })
}

fn to_resource_requirements(spec: &ResourceRequirementsSpec) -> Option<ResourceRequirements> {
    let requests = spec.requests.as_ref().and_then(to_quantity_map);
    let limits = spec.limits.as_ref().and_then(to_quantity_map);
    if requests.is_none() && limits.is_none() {
        return None;
    }
    Some(ResourceRequirements {
        requests,
        limits,
        ..Default::default()
    })
}

fn to_quantity_map(spec: &ResourceSpec) -> Option<BTreeMap<String, Quantity>> {
    let mut map = BTreeMap::new();
    if let Some(cpu) = &spec.cpu {
        map.insert("cpu".to_string(), Quantity(cpu.clone()));
    }
    if let Some(memory) = &spec.memory {
        map.insert("memory".to_string(), Quantity(memory.clone()));
    }
    (!map.is_empty()).then_some(map)
}

fn to_toleration(spec: &crate::crd::Toleration) -> Toleration {
    Toleration {
        key: spec.key.clone(),
        operator: spec.operator.clone(),
        value: spec.value.clone(),
        effect: spec.effect.clone(),
        toleration_seconds: spec.toleration_seconds,
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

fn non_empty_map(map: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!map.is_empty()).then_some(map)
}
