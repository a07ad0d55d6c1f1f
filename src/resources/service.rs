//! Service construction: internal discovery and external access.

use crate::component::ComponentKind;
use crate::crd::ComponentSpec;
use crate::hash::hash_object;
use crate::resources::{labels, ports, MANAGED_HASH_ANNOTATION};
use k8s_openapi::api::core::v1::{Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

/// Build the internal (headless) discovery service for one component.
///
/// Headless with not-ready addresses published: peers must resolve each
/// other during startup, before any replica passes readiness.
pub fn build_internal_service(
    cluster: &str,
    namespace: &str,
    kind: ComponentKind,
    config: &BTreeMap<String, String>,
    owner: Option<OwnerReference>,
) -> Service {
    let selector = labels::selector_labels(cluster, kind);
    let spec = ServiceSpec {
        cluster_ip: Some("None".to_string()),
        publish_not_ready_addresses: Some(true),
        selector: Some(selector.clone()),
        ports: Some(ports::service_ports(kind, config)),
        ..Default::default()
    };
    service_object(
        kind.internal_service_name(cluster),
        namespace,
        selector,
        BTreeMap::new(),
        spec,
        owner,
    )
}

/// Build the externally reachable service for one component.
///
/// Type and load balancer IP come from the component spec; the default is a
/// plain ClusterIP service.
pub fn build_external_service(
    cluster: &str,
    namespace: &str,
    kind: ComponentKind,
    spec: &ComponentSpec,
    config: &BTreeMap<String, String>,
    owner: Option<OwnerReference>,
) -> Service {
    let selector = labels::selector_labels(cluster, kind);
    let external = spec.service.as_ref();
    let service_spec = ServiceSpec {
        type_: Some(
            external
                .map(|s| s.service_type.clone())
                .unwrap_or_else(|| "ClusterIP".to_string()),
        ),
        load_balancer_ip: external.and_then(|s| s.load_balancer_ip.clone()),
        selector: Some(selector.clone()),
        ports: Some(ports::service_ports(kind, config)),
        ..Default::default()
    };
    let user_annotations = external
        .map(|s| s.annotations.clone())
        .unwrap_or_default();
    service_object(
        kind.external_service_name(cluster),
        namespace,
        selector,
        user_annotations,
        service_spec,
        owner,
    )
}

fn service_object(
    name: String,
    namespace: &str,
    selector: BTreeMap<String, String>,
    user_annotations: BTreeMap<String, String>,
    spec: ServiceSpec,
    owner: Option<OwnerReference>,
) -> Service {
    let mut annotations = user_annotations;
    // The managed hash must survive any user-declared annotation keys.
    annotations.insert(MANAGED_HASH_ANNOTATION.to_string(), hash_object(&spec));
    Service {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(namespace.to_string()),
            labels: Some(selector),
            annotations: Some(annotations),
            owner_references: owner.map(|reference| vec![reference]),
            ..Default::default()
        },
        spec: Some(spec),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(service: serde_json::Value) -> ComponentSpec {
        serde_json::from_value(serde_json::json!({
            "image": "basalt/frontend:3.4.1",
            "service": service
        }))
        .unwrap()
    }

    #[test]
    fn internal_service_is_headless_and_publishes_not_ready() {
        let service =
            build_internal_service("prod", "db", ComponentKind::Frontend, &BTreeMap::new(), None);
        assert_eq!(
            service.metadata.name.as_deref(),
            Some("prod-frontend-internal")
        );
        let spec = service.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.publish_not_ready_addresses, Some(true));
    }

    #[test]
    fn external_service_takes_type_and_ip_from_spec() {
        let spec = component(serde_json::json!({
            "serviceType": "LoadBalancer",
            "loadBalancerIp": "10.0.0.10"
        }));
        let service = build_external_service(
            "prod",
            "db",
            ComponentKind::Frontend,
            &spec,
            &BTreeMap::new(),
            None,
        );
        let service_spec = service.spec.unwrap();
        assert_eq!(service_spec.type_.as_deref(), Some("LoadBalancer"));
        assert_eq!(service_spec.load_balancer_ip.as_deref(), Some("10.0.0.10"));
    }

    #[test]
    fn external_service_defaults_to_cluster_ip() {
        let spec: ComponentSpec =
            serde_json::from_value(serde_json::json!({"image": "basalt/frontend:3.4.1"})).unwrap();
        let service = build_external_service(
            "prod",
            "db",
            ComponentKind::Frontend,
            &spec,
            &BTreeMap::new(),
            None,
        );
        assert_eq!(service.spec.unwrap().type_.as_deref(), Some("ClusterIP"));
    }

    #[test]
    fn managed_hash_survives_user_annotations() {
        let spec = component(serde_json::json!({
            "annotations": {"basalt.io/managed-hash": "forged"}
        }));
        let service = build_external_service(
            "prod",
            "db",
            ComponentKind::Frontend,
            &spec,
            &BTreeMap::new(),
            None,
        );
        let annotations = service.metadata.annotations.unwrap();
        assert_ne!(annotations[MANAGED_HASH_ANNOTATION], "forged");
    }

    #[test]
    fn services_select_the_component_pods() {
        let service =
            build_internal_service("prod", "db", ComponentKind::Backend, &BTreeMap::new(), None);
        let selector = service.spec.unwrap().selector.unwrap();
        assert_eq!(selector["app.kubernetes.io/component"], "backend");
        assert_eq!(selector["app.kubernetes.io/instance"], "prod");
    }
}
