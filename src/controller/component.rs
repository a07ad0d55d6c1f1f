//! Per-component Sync / UpdateStatus / Clear engine.
//!
//! Each cluster sub-component runs the same pass: validate, resolve config,
//! assemble the desired object set, then apply it read-compare-write. A
//! failure anywhere aborts the pass with no further writes; retry belongs to
//! the controller runtime re-triggering reconciliation, never to this engine.

use super::{apply, ControllerContext};
use crate::component::ComponentKind;
use crate::config;
use crate::crd::{BasaltCluster, ComponentPhase, ComponentStatus};
use crate::error::{OperatorError, OperatorResult};
use crate::resources;
use crate::resources::probes::ProbeMode;
use crate::resources::{labels, ComponentAssembly};
use crate::status;
use crate::version;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Pod, Service};
use kube::api::ListParams;
use kube::{Api, Resource, ResourceExt};
use std::sync::Arc;

/// Release lines in which the Basalt HTTP health endpoint shipped. Older
/// patches in these lines get TCP probes instead.
const HTTP_HEALTH_SINCE: &[&str] = &["3.3.2", "3.4.1"];

/// Reconciliation engine for one sub-component of a cluster.
pub struct ComponentController {
    kind: ComponentKind,
    ctx: Arc<ControllerContext>,
}

impl ComponentController {
    /// Create the engine for one component kind.
    pub fn new(kind: ComponentKind, ctx: Arc<ControllerContext>) -> Self {
        Self { kind, ctx }
    }

    /// Drive the component's derived objects toward the declared spec.
    ///
    /// A disabled component (absent from the cluster spec) is a no-op.
    pub async fn sync(&self, cluster: &BasaltCluster, namespace: &str) -> OperatorResult<()> {
        let Some(spec) = cluster.spec.component(self.kind) else {
            return Ok(());
        };
        let name = cluster.name_any();
        tracing::debug!(
            cluster = %name,
            component = %self.kind,
            "Syncing component"
        );

        // Structural checks run before any derived object is computed.
        resources::validate_component(self.kind, spec)?;

        let config_api: Api<ConfigMap> = Api::namespaced(self.ctx.client.clone(), namespace);
        let config = config::resolve(&config_api, self.kind, spec.config.as_ref()).await?;

        let probe_mode = probe_mode_for_image(&spec.image)?;
        let owner = cluster.controller_owner_ref(&());
        let assembly = resources::build_component(
            &cluster.metadata,
            self.kind,
            spec,
            &config,
            probe_mode,
            owner,
        )?;

        self.apply_assembly(namespace, &assembly).await?;

        tracing::info!(
            cluster = %name,
            component = %self.kind,
            "Component synced"
        );
        Ok(())
    }

    /// Apply the desired set in order: workload controller, then internal
    /// service, then external service. A failure leaves already-applied
    /// objects as they are; there is no rollback.
    async fn apply_assembly(
        &self,
        namespace: &str,
        assembly: &ComponentAssembly,
    ) -> OperatorResult<()> {
        let statefulsets: Api<StatefulSet> = Api::namespaced(self.ctx.client.clone(), namespace);
        apply::apply(&statefulsets, &assembly.statefulset).await?;

        let services: Api<Service> = Api::namespaced(self.ctx.client.clone(), namespace);
        apply::apply(&services, &assembly.internal_service).await?;
        apply::apply(&services, &assembly.external_service).await?;
        Ok(())
    }

    /// Recompute the component's persisted status from live pods.
    ///
    /// Independent of Sync: runs whether or not the last Sync succeeded. A
    /// component absent from the spec clears its status to absent.
    pub async fn update_status(
        &self,
        cluster: &BasaltCluster,
        namespace: &str,
    ) -> OperatorResult<Option<ComponentStatus>> {
        let Some(spec) = cluster.spec.component(self.kind) else {
            return Ok(None);
        };
        let cluster_name = cluster.name_any();

        // Name bookkeeping is recomputed unconditionally; it must not depend
        // on what the last pass managed to write.
        let service_name = self.kind.internal_service_name(&cluster_name);
        let resource_names = vec![
            self.kind.workload_name(&cluster_name),
            self.kind.internal_service_name(&cluster_name),
            self.kind.external_service_name(&cluster_name),
        ];

        let pods: Api<Pod> = Api::namespaced(self.ctx.client.clone(), namespace);
        let selector = labels::selector_string(&cluster_name, self.kind);
        let pod_list = pods.list(&ListParams::default().labels(&selector)).await?;
        let buckets = status::count(&pod_list.items);

        let expected = usize::try_from(spec.replicas.max(0)).unwrap_or(0);
        let (phase, reason) = if !buckets.failed.is_empty() {
            (
                ComponentPhase::Failed,
                Some(format!("failed pods: {}", buckets.failed.join(", "))),
            )
        } else if buckets.ready.len() == expected && buckets.creating.is_empty() {
            (ComponentPhase::Running, None)
        } else {
            (
                ComponentPhase::Reconciling,
                Some(format!(
                    "{}/{} pods ready",
                    buckets.ready.len(),
                    expected
                )),
            )
        };

        Ok(Some(ComponentStatus {
            phase,
            reason,
            service_name: Some(service_name),
            resource_names,
            ready_instances: buckets.ready,
            creating_instances: buckets.creating,
            failed_instances: buckets.failed,
        }))
    }

    /// Tear down the component's derived objects.
    ///
    /// Only proceeds when a previously-recorded status exists: a component
    /// that never successfully synced owns nothing to tear down. Deletion
    /// order mirrors apply order; each step tolerates "already absent".
    pub async fn clear(&self, cluster: &BasaltCluster, namespace: &str) -> OperatorResult<()> {
        let recorded = cluster
            .status
            .as_ref()
            .and_then(|status| status.component(self.kind));
        if recorded.is_none() {
            return Ok(());
        }
        let cluster_name = cluster.name_any();
        tracing::info!(
            cluster = %cluster_name,
            component = %self.kind,
            "Clearing component objects"
        );

        let statefulsets: Api<StatefulSet> = Api::namespaced(self.ctx.client.clone(), namespace);
        apply::delete_if_present(&statefulsets, &self.kind.workload_name(&cluster_name)).await?;

        let services: Api<Service> = Api::namespaced(self.ctx.client.clone(), namespace);
        apply::delete_if_present(&services, &self.kind.internal_service_name(&cluster_name))
            .await?;
        apply::delete_if_present(&services, &self.kind.external_service_name(&cluster_name))
            .await?;
        Ok(())
    }
}

/// Select how probes reach the managed process, based on the image tag.
///
/// A version format error or an unknown release line is fatal to the pass:
/// guessing probe semantics for an untested release risks generating an
/// invalid deployment.
fn probe_mode_for_image(image: &str) -> OperatorResult<ProbeMode> {
    let tag = version::image_tag(image);
    if version::is_lower_than_any(tag, HTTP_HEALTH_SINCE)? {
        Ok(ProbeMode::TcpSocket)
    } else {
        Ok(ProbeMode::HttpGet)
    }
}
