//! Basalt Kubernetes Operator binary.
//!
//! Runs the operator, which manages BasaltCluster custom resources in a
//! Kubernetes cluster.

use basalt_operator::controller::{error_policy, ClusterController, ControllerContext};
use basalt_operator::crd::BasaltCluster;
use basalt_operator::error::OperatorError;
use futures::StreamExt;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("basalt_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    tracing::info!("Starting Basalt Kubernetes Operator");

    // Check for CRD generation mode
    if std::env::args().any(|arg| arg == "--generate-crds") {
        generate_crds()?;
        return Ok(());
    }

    // Connect to Kubernetes
    let client = Client::try_default().await?;
    tracing::info!("Connected to Kubernetes cluster");

    let ctx = Arc::new(ControllerContext::new(client.clone()));
    run_cluster_controller(client, ctx).await
}

/// Run the BasaltCluster controller until shutdown.
async fn run_cluster_controller(client: Client, ctx: Arc<ControllerContext>) -> anyhow::Result<()> {
    tracing::info!("Starting BasaltCluster controller");

    let clusters: Api<BasaltCluster> = Api::all(client);
    let controller = ClusterController::new(ctx.clone());

    Controller::new(clusters, WatcherConfig::default())
        .shutdown_on_signal()
        .run(
            move |cluster, _ctx| {
                let controller = controller.clone();
                async move {
                    match controller.reconcile(cluster).await {
                        Ok(action) => match action {
                            basalt_operator::controller::ReconcileAction::Requeue(duration) => {
                                Ok(Action::requeue(duration))
                            }
                            basalt_operator::controller::ReconcileAction::Done => {
                                Ok(Action::await_change())
                            }
                        },
                        Err(e) => {
                            tracing::error!(error = %e, "Cluster reconciliation error");
                            Ok(Action::requeue(Duration::from_secs(30)))
                        }
                    }
                }
            },
            |cluster, error: &OperatorError, ctx| error_policy(cluster, error, ctx),
            ctx,
        )
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(
                        cluster = %obj.name,
                        ?action,
                        "Reconciled cluster"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Cluster controller stream error");
                }
            }
        })
        .await;

    Ok(())
}

/// Generate CRD YAML.
fn generate_crds() -> anyhow::Result<()> {
    println!("---");
    println!("{}", serde_yaml::to_string(&BasaltCluster::crd())?);
    Ok(())
}
