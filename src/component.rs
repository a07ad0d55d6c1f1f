//! Component kinds of a Basalt cluster and their per-kind tables.
//!
//! Each role of the managed database (frontend, backend, compute, observer)
//! carries its own port table, default values, and derived object names.
//! Everything name-shaped here is deterministic in cluster name + kind, which
//! is what keeps derived object identity stable across reconciliations.

use std::fmt;

/// Default query port used when a component's config does not override it.
pub const DEFAULT_QUERY_PORT: i32 = 9030;

/// One entry of a component's port table.
///
/// `key` is looked up in the component's resolved configuration mapping;
/// `default` applies when the key is absent. `name` is the port's name on the
/// container and the service.
#[derive(Debug, Clone, Copy)]
pub struct PortEntry {
    /// Config key resolving the port number.
    pub key: &'static str,
    /// Port name on container and service objects.
    pub name: &'static str,
    /// Fallback when the config key is absent.
    pub default: i32,
}

const FRONTEND_PORTS: &[PortEntry] = &[
    PortEntry {
        key: "http_port",
        name: "http",
        default: 8030,
    },
    PortEntry {
        key: "rpc_port",
        name: "rpc",
        default: 9020,
    },
    PortEntry {
        key: "query_port",
        name: "query",
        default: DEFAULT_QUERY_PORT,
    },
    PortEntry {
        key: "edit_log_port",
        name: "edit-log",
        default: 9010,
    },
];

const BACKEND_PORTS: &[PortEntry] = &[
    PortEntry {
        key: "be_port",
        name: "be",
        default: 9060,
    },
    PortEntry {
        key: "webserver_port",
        name: "webserver",
        default: 8040,
    },
    PortEntry {
        key: "heartbeat_service_port",
        name: "heartbeat",
        default: 9050,
    },
    PortEntry {
        key: "brpc_port",
        name: "brpc",
        default: 8060,
    },
];

/// One role of a managed Basalt cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Query coordination and metadata.
    Frontend,
    /// Storage and execution.
    Backend,
    /// Stateless execution.
    Compute,
    /// Read-only metadata follower.
    Observer,
}

impl ComponentKind {
    /// All kinds, in reconcile order.
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Frontend,
        ComponentKind::Backend,
        ComponentKind::Compute,
        ComponentKind::Observer,
    ];

    /// The kind's lowercase tag, used in names, labels, and env vars.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Frontend => "frontend",
            ComponentKind::Backend => "backend",
            ComponentKind::Compute => "compute",
            ComponentKind::Observer => "observer",
        }
    }

    /// The kind's fixed port table. Observers share the frontend table;
    /// compute nodes share the backend table.
    pub fn port_table(&self) -> &'static [PortEntry] {
        match self {
            ComponentKind::Frontend | ComponentKind::Observer => FRONTEND_PORTS,
            ComponentKind::Backend | ComponentKind::Compute => BACKEND_PORTS,
        }
    }

    /// Config key of the port probed for health (the HTTP port).
    pub fn primary_port_key(&self) -> &'static str {
        match self {
            ComponentKind::Frontend | ComponentKind::Observer => "http_port",
            ComponentKind::Backend | ComponentKind::Compute => "webserver_port",
        }
    }

    /// Default of the primary port when unset in config.
    pub fn primary_port_default(&self) -> i32 {
        match self {
            ComponentKind::Frontend | ComponentKind::Observer => 8030,
            ComponentKind::Backend | ComponentKind::Compute => 8040,
        }
    }

    /// Name of the workload controller for this kind.
    pub fn workload_name(&self, cluster: &str) -> String {
        format!("{}-{}", cluster, self.as_str())
    }

    /// Name of the internal (headless) discovery service for this kind.
    pub fn internal_service_name(&self, cluster: &str) -> String {
        format!("{}-{}-internal", cluster, self.as_str())
    }

    /// Name of the externally reachable service for this kind.
    pub fn external_service_name(&self, cluster: &str) -> String {
        format!("{}-{}-service", cluster, self.as_str())
    }

    /// Cluster annotation key that triggers a rolling restart of this kind.
    pub fn restart_marker_key(&self) -> String {
        format!("basalt.io/{}-restart", self.as_str())
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
