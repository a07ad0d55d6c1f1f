//! Probe and lifecycle hook construction.
//!
//! All probes run at a fixed 5-second period against the component's primary
//! port. Startup gets a long default window (the managed process replays
//! metadata on boot); liveness and readiness get short ones. A user override
//! is expressed in seconds and converted to whole periods by ceiling
//! division, so an override of exactly one period yields a threshold of 1,
//! never 0.

use k8s_openapi::api::core::v1::{
    ExecAction, HTTPGetAction, Lifecycle, LifecycleHandler, Probe, TCPSocketAction,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Seconds between probe attempts.
pub const PROBE_PERIOD_SECONDS: i32 = 5;

/// Default startup failure threshold, in periods (5 minutes).
pub const STARTUP_FAILURE_THRESHOLD: i32 = 60;

/// Default liveness/readiness failure threshold, in periods.
pub const RUNTIME_FAILURE_THRESHOLD: i32 = 3;

/// HTTP path probed on releases that ship the health endpoint.
pub const HEALTH_PATH: &str = "/api/health";

/// Script invoked before the platform stops a pod, relative to the
/// component root.
pub const PRE_STOP_SCRIPT: &str = "bin/pre_stop.sh";

/// How probes reach the managed process, selected by the version gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// HTTP GET against the health endpoint.
    HttpGet,
    /// Plain TCP connect, for releases without the health endpoint.
    TcpSocket,
}

/// Convert an optional override in seconds to a failure threshold in whole
/// periods. Zero or absent falls back to the default.
fn failure_threshold(override_seconds: Option<i32>, default: i32) -> i32 {
    match override_seconds {
        Some(seconds) if seconds > 0 => {
            (seconds + PROBE_PERIOD_SECONDS - 1) / PROBE_PERIOD_SECONDS
        }
        _ => default,
    }
}

fn probe(port: i32, mode: ProbeMode, threshold: i32) -> Probe {
    let mut built = Probe {
        period_seconds: Some(PROBE_PERIOD_SECONDS),
        failure_threshold: Some(threshold),
        ..Default::default()
    };
    match mode {
        ProbeMode::HttpGet => {
            built.http_get = Some(HTTPGetAction {
                path: Some(HEALTH_PATH.to_string()),
                port: IntOrString::Int(port),
                ..Default::default()
            });
        }
        ProbeMode::TcpSocket => {
            built.tcp_socket = Some(TCPSocketAction {
                port: IntOrString::Int(port),
                ..Default::default()
            });
        }
    }
    built
}

/// Startup probe for the primary port.
pub fn startup_probe(port: i32, mode: ProbeMode, override_seconds: Option<i32>) -> Probe {
    probe(
        port,
        mode,
        failure_threshold(override_seconds, STARTUP_FAILURE_THRESHOLD),
    )
}

/// Liveness probe for the primary port.
pub fn liveness_probe(port: i32, mode: ProbeMode, override_seconds: Option<i32>) -> Probe {
    probe(
        port,
        mode,
        failure_threshold(override_seconds, RUNTIME_FAILURE_THRESHOLD),
    )
}

/// Readiness probe for the primary port.
pub fn readiness_probe(port: i32, mode: ProbeMode, override_seconds: Option<i32>) -> Probe {
    probe(
        port,
        mode,
        failure_threshold(override_seconds, RUNTIME_FAILURE_THRESHOLD),
    )
}

/// Pre-stop hook invoking the shutdown script under the component root.
pub fn lifecycle(root: &str) -> Lifecycle {
    Lifecycle {
        pre_stop: Some(LifecycleHandler {
            exec: Some(ExecAction {
                command: Some(vec![format!("{}/{}", root.trim_end_matches('/'), PRE_STOP_SCRIPT)]),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
