//! Custom Resource Definitions for Basalt clusters.

mod cluster;

pub use cluster::{
    BasaltCluster, BasaltClusterSpec, BasaltClusterStatus, ClusterPhase, ComponentPhase,
    ComponentSpec, ComponentStatus, ConfigSourceRef, EnvValue, EnvVarSpec, ExternalServiceSpec,
    MountRef, ResourceRequirementsSpec, ResourceSpec, RunAsIdentity, StorageVolume, Toleration,
};
