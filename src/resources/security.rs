//! Pod and container security contexts.

use crate::crd::RunAsIdentity;
use k8s_openapi::api::core::v1::{PodSecurityContext, SecurityContext};

/// Pod-level security context.
///
/// A declared non-root identity sets fsGroup so mounted volumes are
/// group-writable by the managed process, with the group change applied only
/// on ownership mismatch.
pub fn pod_security_context(run_as: Option<&RunAsIdentity>) -> Option<PodSecurityContext> {
    run_as.map(|identity| PodSecurityContext {
        fs_group: Some(identity.gid),
        fs_group_change_policy: Some("OnRootMismatch".to_string()),
        ..Default::default()
    })
}

/// Container-level security context.
///
/// Privilege escalation is always disabled. The root filesystem is never
/// read-only: the managed process writes its pid file at a fixed path.
/// runAsNonRoot is asserted only for a declared non-zero uid.
pub fn container_security_context(run_as: Option<&RunAsIdentity>) -> SecurityContext {
    SecurityContext {
        run_as_user: run_as.map(|identity| identity.uid),
        run_as_group: run_as.map(|identity| identity.gid),
        run_as_non_root: run_as.map(|identity| identity.uid != 0),
        allow_privilege_escalation: Some(false),
        read_only_root_filesystem: Some(false),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_identity_means_no_pod_context() {
        assert!(pod_security_context(None).is_none());
    }

    #[test]
    fn identity_sets_fs_group_and_policy() {
        let identity = RunAsIdentity { uid: 1000, gid: 1000 };
        let context = pod_security_context(Some(&identity)).unwrap();
        assert_eq!(context.fs_group, Some(1000));
        assert_eq!(
            context.fs_group_change_policy.as_deref(),
            Some("OnRootMismatch")
        );
    }

    #[test]
    fn non_zero_uid_asserts_non_root() {
        let context = container_security_context(Some(&RunAsIdentity { uid: 1000, gid: 1000 }));
        assert_eq!(context.run_as_non_root, Some(true));
        assert_eq!(context.run_as_user, Some(1000));
    }

    #[test]
    fn zero_uid_does_not_assert_non_root() {
        let context = container_security_context(Some(&RunAsIdentity { uid: 0, gid: 0 }));
        assert_eq!(context.run_as_non_root, Some(false));
    }

    #[test]
    fn escalation_disabled_and_rootfs_writable_always() {
        for identity in [None, Some(RunAsIdentity { uid: 1000, gid: 1000 })] {
            let context = container_security_context(identity.as_ref());
            assert_eq!(context.allow_privilege_escalation, Some(false));
            assert_eq!(context.read_only_root_filesystem, Some(false));
        }
    }
}
