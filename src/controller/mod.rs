//! Kubernetes controllers for Basalt resources.
//!
//! [`ClusterController`] reconciles BasaltCluster resources by driving one
//! [`ComponentController`] per sub-component through its Sync / UpdateStatus
//! / Clear pass.
//!
//! # Usage with kube-runtime
//!
//! The controller runtime requires both a reconcile function and an error
//! policy:
//!
//! ```ignore
//! use basalt_operator::controller::{ClusterController, error_policy};
//!
//! Controller::new(clusters, watcher_config)
//!     .run(|cluster, ctx| async move {
//!         let controller = ClusterController::new(ctx.clone());
//!         controller.reconcile(cluster).await
//!     }, error_policy, context)
//!     .for_each(|_| futures::future::ready(()))
//!     .await;
//! ```

pub mod apply;
mod cluster;
mod component;

pub use cluster::{ClusterController, FINALIZER};
pub use component::ComponentController;

use kube::runtime::events::Reporter;

/// Shared context for controllers.
pub struct ControllerContext {
    /// Kubernetes client.
    pub client: kube::Client,
    /// Event reporter identity.
    pub reporter: Reporter,
}

impl ControllerContext {
    /// Create a new controller context.
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: "basalt-operator".to_string(),
                instance: None,
            },
        }
    }
}

/// Result type for reconciliation actions.
#[derive(Debug)]
pub enum ReconcileAction {
    /// Requeue after the specified duration.
    Requeue(std::time::Duration),
    /// Don't requeue (reconciliation complete).
    Done,
}

impl ReconcileAction {
    /// Requeue after 30 seconds (waiting on pods to converge).
    pub fn requeue_medium() -> Self {
        Self::Requeue(std::time::Duration::from_secs(30))
    }

    /// Requeue after 5 minutes (periodic reconciliation).
    pub fn requeue_long() -> Self {
        Self::Requeue(std::time::Duration::from_secs(300))
    }
}

/// Handle errors during reconciliation.
pub fn error_policy(
    _cluster: std::sync::Arc<crate::crd::BasaltCluster>,
    error: &crate::error::OperatorError,
    _ctx: std::sync::Arc<ControllerContext>,
) -> kube::runtime::controller::Action {
    tracing::error!(error = %error, "Reconciliation error");
    // Requeue after error with backoff.
    kube::runtime::controller::Action::requeue(std::time::Duration::from_secs(30))
}
