//! Environment variable assembly.
//!
//! Assembly starts from the user's declared variables (copied, never
//! mutated in place), then appends platform identity variables and
//! component-specific variables. Ties break first-write-wins: a name the
//! user already declared suppresses the engine default of the same name.

use crate::component::{ComponentKind, DEFAULT_QUERY_PORT};
use crate::config::resolved_port;
use crate::crd::{ComponentSpec, EnvValue, EnvVarSpec};
use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, ObjectFieldSelector};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Name of the root-directory override variable.
pub const ROOT_ENV_NAME: &str = "BASALT_ROOT";

/// Default install root of the managed process.
pub const DEFAULT_ROOT: &str = "/opt/basalt";

/// The component's resolved root directory: a user-declared literal
/// `BASALT_ROOT` wins, otherwise the default root.
pub fn resolved_root(spec: &ComponentSpec) -> String {
    spec.env
        .iter()
        .find_map(|entry| match (&entry.name, &entry.value) {
            (name, EnvValue::Value(value)) if name == ROOT_ENV_NAME => Some(value.clone()),
            _ => None,
        })
        .unwrap_or_else(|| DEFAULT_ROOT.to_string())
}

/// Assemble the container environment for one component.
pub fn build_env(
    kind: ComponentKind,
    cluster: &str,
    namespace: &str,
    spec: &ComponentSpec,
    config: &BTreeMap<String, String>,
) -> Vec<EnvVar> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut env: Vec<EnvVar> = Vec::new();

    // User-declared variables first; their names suppress engine defaults.
    for entry in &spec.env {
        if seen.insert(entry.name.clone()) {
            env.push(to_env_var(entry));
        }
    }

    let mut push_default = |var: EnvVar| {
        if seen.insert(var.name.clone()) {
            env.push(var);
        }
    };

    // Platform identity, resolved by the platform at pod start.
    push_default(field_ref_var("POD_NAME", "metadata.name"));
    push_default(field_ref_var("POD_NAMESPACE", "metadata.namespace"));
    push_default(field_ref_var("POD_IP", "status.podIP"));
    push_default(field_ref_var("HOST_IP", "status.hostIP"));

    // Component identity and peer discovery.
    push_default(literal_var("COMPONENT_KIND", kind.as_str()));
    let frontend_service = ComponentKind::Frontend.internal_service_name(cluster);
    push_default(literal_var(
        "FRONTEND_ADDR",
        format!("{}.{}", frontend_service, namespace),
    ));
    if kind != ComponentKind::Frontend {
        let query_port = resolved_port(config, "query_port", DEFAULT_QUERY_PORT);
        push_default(literal_var("FRONTEND_QUERY_PORT", query_port.to_string()));
    }

    env
}

fn to_env_var(entry: &EnvVarSpec) -> EnvVar {
    match &entry.value {
        EnvValue::Value(value) => literal_var(&entry.name, value.clone()),
        EnvValue::FieldRef(path) => field_ref_var(&entry.name, path),
    }
}

fn literal_var(name: impl Into<String>, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn field_ref_var(name: impl Into<String>, path: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: path.into(),
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

    fn component(env: Vec<EnvVarSpec>) -> ComponentSpec {
        let mut spec: ComponentSpec =
            serde_json::from_value(serde_json::json!({"image": "basalt/backend:3.3.9"})).unwrap();
        spec.env = env;
        spec
    }

    fn names(env: &[EnvVar]) -> Vec<&str> {
        env.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn identity_vars_are_field_references() {
        let env = build_env(
            ComponentKind::Backend,
            "prod",
            "db",
            &component(vec![]),
            &BTreeMap::new(),
        );
        let pod_name = env.iter().find(|v| v.name == "POD_NAME").unwrap();
        assert!(pod_name.value.is_none());
        let field = pod_name
            .value_from
            .as_ref()
            .and_then(|s| s.field_ref.as_ref())
            .unwrap();
        assert_eq!(field.field_path, "metadata.name");
    }

    #[test]
    fn user_declared_name_suppresses_engine_default() {
        let env = build_env(
            ComponentKind::Backend,
            "prod",
            "db",
            &component(vec![EnvVarSpec::literal("POD_NAME", "static-name")]),
            &BTreeMap::new(),
        );
        let matches: Vec<_> = env.iter().filter(|v| v.name == "POD_NAME").collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].value.as_deref(), Some("static-name"));
        assert!(matches[0].value_from.is_none());
    }

    #[test]
    fn user_vars_come_first() {
        let env = build_env(
            ComponentKind::Backend,
            "prod",
            "db",
            &component(vec![EnvVarSpec::literal("JAVA_OPTS", "-Xmx4g")]),
            &BTreeMap::new(),
        );
        assert_eq!(env[0].name, "JAVA_OPTS");
    }

    #[test]
    fn frontend_addr_points_at_internal_service() {
        let env = build_env(
            ComponentKind::Compute,
            "prod",
            "db",
            &component(vec![]),
            &BTreeMap::new(),
        );
        let addr = env.iter().find(|v| v.name == "FRONTEND_ADDR").unwrap();
        assert_eq!(addr.value.as_deref(), Some("prod-frontend-internal.db"));
    }

    #[test]
    fn query_port_only_for_non_frontend_kinds() {
        let frontend = build_env(
            ComponentKind::Frontend,
            "prod",
            "db",
            &component(vec![]),
            &BTreeMap::new(),
        );
        assert!(!names(&frontend).contains(&"FRONTEND_QUERY_PORT"));

        let mut config = BTreeMap::new();
        config.insert("query_port".to_string(), "9031".to_string());
        let backend = build_env(
            ComponentKind::Backend,
            "prod",
            "db",
            &component(vec![]),
            &config,
        );
        let port = backend
            .iter()
            .find(|v| v.name == "FRONTEND_QUERY_PORT")
            .unwrap();
        assert_eq!(port.value.as_deref(), Some("9031"));
    }

    #[test]
    fn resolved_root_prefers_user_override() {
        assert_eq!(resolved_root(&component(vec![])), DEFAULT_ROOT);
        assert_eq!(
            resolved_root(&component(vec![EnvVarSpec::literal(
                ROOT_ENV_NAME,
                "/srv/basalt"
            )])),
            "/srv/basalt"
        );
        // A field-reference BASALT_ROOT cannot be resolved at build time.
        assert_eq!(
            resolved_root(&component(vec![EnvVarSpec::field_ref(
                ROOT_ENV_NAME,
                "metadata.name"
            )])),
            DEFAULT_ROOT
        );
    }

    #[test]
    fn caller_spec_is_not_mutated() {
        let spec = component(vec![EnvVarSpec::literal("A", "1")]);
        let before = spec.env.len();
        let _ = build_env(
            ComponentKind::Backend,
            "prod",
            "db",
            &spec,
            &BTreeMap::new(),
        );
        assert_eq!(spec.env.len(), before);
    }
}
