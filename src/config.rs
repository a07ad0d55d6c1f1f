//! Resolution of a component's external configuration.
//!
//! Each component may point at a ConfigMap key holding its `key = value`
//! configuration document (the same file the managed process reads). The
//! engine resolves it into a flat mapping once per pass; port numbers and
//! other generated-spec inputs are looked up there.

use crate::component::ComponentKind;
use crate::crd::ConfigSourceRef;
use crate::error::{OperatorError, OperatorResult};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
use std::collections::BTreeMap;

/// Parse a `key = value` configuration document into a flat mapping.
///
/// Blank lines and `#` comments are skipped; whitespace around keys and
/// values is trimmed; the last occurrence of a key wins.
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                properties.insert(key.to_string(), value.trim().to_string());
            }
        }
    }
    properties
}

/// Fetch and parse the component's configuration document.
///
/// A component without a declared config source resolves to an empty
/// mapping. A declared-but-missing ConfigMap or key aborts the pass.
pub async fn resolve(
    api: &Api<ConfigMap>,
    kind: ComponentKind,
    source: Option<&ConfigSourceRef>,
) -> OperatorResult<BTreeMap<String, String>> {
    let Some(source) = source else {
        return Ok(BTreeMap::new());
    };

    let config_map = api
        .get_opt(&source.config_map_name)
        .await?
        .ok_or_else(|| OperatorError::ConfigResolution {
            component: kind.to_string(),
            name: source.config_map_name.clone(),
            message: "ConfigMap not found".to_string(),
        })?;

    let document = config_map
        .data
        .as_ref()
        .and_then(|data| data.get(&source.resolve_key))
        .ok_or_else(|| OperatorError::ConfigResolution {
            component: kind.to_string(),
            name: source.config_map_name.clone(),
            message: format!("key {:?} not present", source.resolve_key),
        })?;

    Ok(parse_properties(document))
}

/// Look up a port in the resolved configuration, falling back to `default`
/// when the key is absent or does not parse as a port number.
pub fn resolved_port(config: &BTreeMap<String, String>, key: &str, default: i32) -> i32 {
    config
        .get(key)
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}
