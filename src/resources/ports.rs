//! Container and service port lists.

use crate::component::ComponentKind;
use crate::config::resolved_port;
use k8s_openapi::api::core::v1::ContainerPort;
use k8s_openapi::api::core::v1::ServicePort;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

/// The component's container ports, resolved from its configuration.
pub fn container_ports(
    kind: ComponentKind,
    config: &BTreeMap<String, String>,
) -> Vec<ContainerPort> {
    kind.port_table()
        .iter()
        .map(|entry| ContainerPort {
            name: Some(entry.name.to_string()),
            container_port: resolved_port(config, entry.key, entry.default),
            ..Default::default()
        })
        .collect()
}

/// The component's service ports, resolved from its configuration.
///
/// Service ports target the container ports by name so the two lists cannot
/// drift apart.
pub fn service_ports(kind: ComponentKind, config: &BTreeMap<String, String>) -> Vec<ServicePort> {
    kind.port_table()
        .iter()
        .map(|entry| ServicePort {
            name: Some(entry.name.to_string()),
            port: resolved_port(config, entry.key, entry.default),
            target_port: Some(IntOrString::String(entry.name.to_string())),
            ..Default::default()
        })
        .collect()
}

/// The port probed for component health.
pub fn primary_port(kind: ComponentKind, config: &BTreeMap<String, String>) -> i32 {
    resolved_port(config, kind.primary_port_key(), kind.primary_port_default())
}
