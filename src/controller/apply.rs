//! Read-compare-write apply and tolerant delete.
//!
//! Every derived object carries a content hash of its desired spec in the
//! managed-hash annotation. Apply reads the current object, compares hashes,
//! and writes only on difference, so two passes over an unchanged cluster
//! spec produce zero writes on the second pass. Teardown tolerates objects
//! that are already gone.

use crate::error::{OperatorError, OperatorResult};
use crate::resources::MANAGED_HASH_ANNOTATION;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Field manager identifying this operator's writes.
pub const FIELD_MANAGER: &str = "basalt-operator";

/// Outcome of one apply step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The object did not exist and was created.
    Created,
    /// The object existed with a different desired spec and was patched.
    Updated,
    /// The object already matches; nothing was written.
    Unchanged,
}

/// Apply one desired object via read-compare-write.
pub async fn apply<K>(api: &Api<K>, desired: &K) -> OperatorResult<Applied>
where
    K: Resource + Clone + Debug + Serialize + DeserializeOwned,
    K::DynamicType: Default,
{
    let kind = K::kind(&K::DynamicType::default()).to_string();
    let name = desired
        .meta()
        .name
        .clone()
        .ok_or_else(|| OperatorError::InvalidCluster(format!("{} without a name", kind)))?;

    let current = api.get_opt(&name).await?;
    let outcome = match current {
        None => {
            api.create(&PostParams::default(), desired)
                .await
                .map_err(|source| OperatorError::Apply {
                    kind: kind.clone(),
                    name: name.clone(),
                    source,
                })?;
            Applied::Created
        }
        Some(existing) if managed_hash(&existing) == managed_hash(desired) => Applied::Unchanged,
        Some(_) => {
            api.patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Apply(desired),
            )
            .await
            .map_err(|source| OperatorError::Apply {
                kind: kind.clone(),
                name: name.clone(),
                source,
            })?;
            Applied::Updated
        }
    };

    tracing::debug!(kind = %kind, name = %name, outcome = ?outcome, "Applied object");
    Ok(outcome)
}

/// Delete an object, treating "already absent" as success.
pub async fn delete_if_present<K>(api: &Api<K>, name: &str) -> OperatorResult<()>
where
    K: Resource + Clone + Debug + DeserializeOwned,
    K::DynamicType: Default,
{
    let kind = K::kind(&K::DynamicType::default()).to_string();
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            tracing::info!(kind = %kind, name = %name, "Deleted object");
            Ok(())
        }
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
        Err(error) => Err(error.into()),
    }
}

fn managed_hash<K: Resource>(object: &K) -> Option<&String> {
    object
        .meta()
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(MANAGED_HASH_ANNOTATION))
}
