//! BasaltCluster controller.
//!
//! Drives the per-component engines. One reconciliation pass syncs every
//! enabled component in a fixed order (frontend, backend, compute,
//! observer), then recomputes the status sub-resource. Deleted clusters run
//! teardown behind a finalizer so no component is orphaned.

use super::component::ComponentController;
use super::{ControllerContext, ReconcileAction};
use crate::component::ComponentKind;
use crate::crd::{BasaltCluster, BasaltClusterStatus, ClusterPhase, ComponentPhase};
use crate::error::{OperatorError, OperatorResult};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::{Patch, PatchParams};
use kube::runtime::events::{Event, EventType, Recorder};
use kube::{Api, Resource, ResourceExt};
use std::sync::Arc;

/// Finalizer guarding ordered teardown of derived objects.
pub const FINALIZER: &str = "basalt.io/cluster-teardown";

/// Controller for BasaltCluster resources.
#[derive(Clone)]
pub struct ClusterController {
    ctx: Arc<ControllerContext>,
}

impl ClusterController {
    /// Create a new cluster controller.
    pub fn new(ctx: Arc<ControllerContext>) -> Self {
        Self { ctx }
    }

    /// Reconcile a BasaltCluster resource.
    ///
    /// Syncs each enabled component, updates the status sub-resource, and
    /// requeues. A component failure is recorded as a warning event and
    /// returned; the runtime's error policy decides when to retry.
    pub async fn reconcile(&self, cluster: Arc<BasaltCluster>) -> OperatorResult<ReconcileAction> {
        let name = cluster.name_any();
        let namespace = cluster
            .namespace()
            .ok_or_else(|| OperatorError::InvalidCluster("cluster must be namespaced".into()))?;

        tracing::info!(
            name = %name,
            namespace = %namespace,
            "Reconciling BasaltCluster"
        );

        let clusters: Api<BasaltCluster> = Api::namespaced(self.ctx.client.clone(), &namespace);

        if cluster.metadata.deletion_timestamp.is_some() {
            return self.handle_deletion(&cluster, &clusters, &namespace).await;
        }
        self.ensure_finalizer(&cluster, &clusters).await?;

        for kind in ComponentKind::ALL {
            let component = ComponentController::new(kind, self.ctx.clone());
            if let Err(error) = component.sync(&cluster, &namespace).await {
                tracing::warn!(
                    name = %name,
                    component = %kind,
                    error = %error,
                    "Component sync failed"
                );
                self.record_warning(&cluster, kind, &error).await;
                // Status stays current even for a failed pass.
                if let Err(status_error) =
                    self.update_status(&cluster, &clusters, &namespace).await
                {
                    tracing::warn!(
                        name = %name,
                        error = %status_error,
                        "Status update after failed sync also failed"
                    );
                }
                return Err(error);
            }
        }

        self.update_status(&cluster, &clusters, &namespace).await?;
        Ok(ReconcileAction::requeue_long())
    }

    /// Recompute and persist the status sub-resource.
    async fn update_status(
        &self,
        cluster: &BasaltCluster,
        api: &Api<BasaltCluster>,
        namespace: &str,
    ) -> OperatorResult<()> {
        let mut status = BasaltClusterStatus {
            observed_generation: cluster.metadata.generation,
            last_updated: Some(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        for kind in ComponentKind::ALL {
            let component = ComponentController::new(kind, self.ctx.clone());
            let component_status = component.update_status(cluster, namespace).await?;
            status.set_component(kind, component_status);
        }
        status.phase = aggregate_phase(&status);

        let patch = serde_json::json!({ "status": status });
        api.patch_status(
            &cluster.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }

    /// Tear down all components, then release the finalizer.
    async fn handle_deletion(
        &self,
        cluster: &BasaltCluster,
        api: &Api<BasaltCluster>,
        namespace: &str,
    ) -> OperatorResult<ReconcileAction> {
        let name = cluster.name_any();
        if !cluster.finalizers().iter().any(|f| f == FINALIZER) {
            return Ok(ReconcileAction::Done);
        }
        tracing::info!(name = %name, "Cluster marked for deletion, clearing components");

        for kind in ComponentKind::ALL {
            let component = ComponentController::new(kind, self.ctx.clone());
            if let Err(error) = component.clear(cluster, namespace).await {
                self.record_warning(cluster, kind, &error).await;
                return Err(error);
            }
        }

        let finalizers: Vec<&String> = cluster
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != FINALIZER)
            .collect();
        let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        tracing::info!(name = %name, "Cluster teardown complete");
        Ok(ReconcileAction::Done)
    }

    /// Add the teardown finalizer if it is not present yet.
    async fn ensure_finalizer(
        &self,
        cluster: &BasaltCluster,
        api: &Api<BasaltCluster>,
    ) -> OperatorResult<()> {
        if cluster.finalizers().iter().any(|f| f == FINALIZER) {
            return Ok(());
        }
        let mut finalizers = cluster.finalizers().to_vec();
        finalizers.push(FINALIZER.to_string());
        let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        api.patch(
            &cluster.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }

    /// Publish a warning event for a failed pass. Success emits nothing;
    /// one event per failure keeps event volume bounded.
    async fn record_warning(
        &self,
        cluster: &BasaltCluster,
        kind: ComponentKind,
        error: &OperatorError,
    ) {
        let reference = ObjectReference {
            api_version: Some(BasaltCluster::api_version(&()).to_string()),
            kind: Some(BasaltCluster::kind(&()).to_string()),
            name: cluster.metadata.name.clone(),
            namespace: cluster.metadata.namespace.clone(),
            uid: cluster.metadata.uid.clone(),
            ..Default::default()
        };
        let recorder = Recorder::new(
            self.ctx.client.clone(),
            self.ctx.reporter.clone(),
            reference,
        );
        let event = Event {
            type_: EventType::Warning,
            reason: "SyncFailed".to_string(),
            note: Some(format!("{}: {}", kind, error)),
            action: "Sync".to_string(),
            secondary: None,
        };
        if let Err(publish_error) = recorder.publish(event).await {
            tracing::warn!(error = %publish_error, "Failed to publish warning event");
        }
    }
}

/// Reduce component phases to a cluster phase.
fn aggregate_phase(status: &BasaltClusterStatus) -> ClusterPhase {
    let mut all_running = true;
    let mut any_failed = false;
    for kind in ComponentKind::ALL {
        if let Some(component) = status.component(kind) {
            match component.phase {
                ComponentPhase::Failed => any_failed = true,
                ComponentPhase::Running => {}
                ComponentPhase::Reconciling => all_running = false,
            }
        }
    }
    if any_failed {
        ClusterPhase::Failed
    } else if all_running {
        ClusterPhase::Running
    } else {
        ClusterPhase::Reconciling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ComponentStatus;

    fn status_with(phases: &[(ComponentKind, ComponentPhase)]) -> BasaltClusterStatus {
        let mut status = BasaltClusterStatus::default();
        for (kind, phase) in phases {
            status.set_component(
                *kind,
                Some(ComponentStatus {
                    phase: *phase,
                    ..Default::default()
                }),
            );
        }
        status
    }

    #[test]
    fn all_running_components_make_the_cluster_running() {
        let status = status_with(&[
            (ComponentKind::Frontend, ComponentPhase::Running),
            (ComponentKind::Backend, ComponentPhase::Running),
        ]);
        assert_eq!(aggregate_phase(&status), ClusterPhase::Running);
    }

    #[test]
    fn any_failed_component_fails_the_cluster() {
        let status = status_with(&[
            (ComponentKind::Frontend, ComponentPhase::Running),
            (ComponentKind::Backend, ComponentPhase::Failed),
        ]);
        assert_eq!(aggregate_phase(&status), ClusterPhase::Failed);
    }

    #[test]
    fn converging_component_keeps_the_cluster_reconciling() {
        let status = status_with(&[
            (ComponentKind::Frontend, ComponentPhase::Running),
            (ComponentKind::Compute, ComponentPhase::Reconciling),
        ]);
        assert_eq!(aggregate_phase(&status), ClusterPhase::Reconciling);
    }
}
