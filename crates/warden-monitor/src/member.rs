//! Member readiness from member leases
//!
//! Each etcd member renews its own lease, named after its pod, and records
//! `"<memberID>:<role>"` as the holder identity. A lease that stops being
//! renewed first makes the member Unknown; if it stays unrenewed past a
//! second grace period the member is declared NotReady.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use tracing::{debug, warn};

use warden_common::crd::{Etcd, EtcdMemberStatus, EtcdRole, MemberStatus};

use crate::client::MonitorClient;
use crate::condition::{elapsed_since, transition_time};
use crate::config::ProbeConfig;
use crate::prober::{ProbeContext, Prober};

/// The member lease could not be read
pub const REASON_ERROR_FETCHING_MEMBER_LEASE: &str = "ErrorFetchingMemberLease";
/// The lease stayed unrenewed past both grace periods
pub const REASON_UNKNOWN_GRACE_PERIOD_EXCEEDED: &str = "UnknownGracePeriodExceeded";
/// The lease expired and the member's containers are not ready
pub const REASON_CONTAINERS_NOT_READY: &str = "ContainersNotReady";
/// The lease expired but the member's containers look ready
pub const REASON_LEASE_EXPIRED: &str = "LeaseExpired";
/// The lease is being renewed
pub const REASON_LEASE_SUCCEEDED: &str = "LeaseSucceeded";

const CONTAINERS_READY_CONDITION: &str = "ContainersReady";

/// Reports one [`EtcdMemberStatus`] per member lease
pub struct MemberReadyProber {
    client: Arc<dyn MonitorClient>,
    config: Arc<ProbeConfig>,
}

impl MemberReadyProber {
    /// Create a member prober
    pub fn new(client: Arc<dyn MonitorClient>, config: Arc<ProbeConfig>) -> Self {
        Self { client, config }
    }

    async fn probe_member(
        &self,
        ctx: &ProbeContext,
        etcd: &Etcd,
        namespace: &str,
        name: &str,
    ) -> Option<EtcdMemberStatus> {
        let now = ctx.now();
        let stored = etcd
            .status
            .as_ref()
            .and_then(|s| s.member(name));

        let lease = match ctx
            .fetch(
                &format!("get lease {name}"),
                self.client.get_lease(namespace, name),
            )
            .await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => return None,
            Err(e) if e.is_not_found() => return None,
            Err(e) => {
                warn!(etcd = %etcd.name_any(), member = %name, error = %e, "Failed to get member lease");
                return Some(member_status(
                    name,
                    stored.and_then(|m| m.id.clone()),
                    stored.and_then(|m| m.role),
                    MemberStatus::Unknown,
                    REASON_ERROR_FETCHING_MEMBER_LEASE,
                    stored,
                    now,
                ));
            }
        };

        let Some(renewed_at) = renew_time(&lease) else {
            debug!(member = %name, "Member lease not renewed yet, member is bootstrapping");
            return None;
        };
        let (id, role) = lease
            .spec
            .as_ref()
            .and_then(|s| s.holder_identity.as_deref())
            .map(parse_holder_identity)
            .unwrap_or_default();

        let age = elapsed_since(renewed_at, now);
        let unknown_after = self.config.member_unknown_threshold;
        let not_ready_after = unknown_after.saturating_add(self.config.member_not_ready_threshold);

        let (status, reason) = if age > not_ready_after {
            (MemberStatus::NotReady, REASON_UNKNOWN_GRACE_PERIOD_EXCEEDED)
        } else if age > unknown_after {
            self.classify_expired(ctx, namespace, name).await
        } else {
            (MemberStatus::Ready, REASON_LEASE_SUCCEEDED)
        };

        Some(member_status(name, id, role, status, reason, stored, now))
    }

    /// A lease expired within the grace period: the pod decides
    async fn classify_expired(
        &self,
        ctx: &ProbeContext,
        namespace: &str,
        name: &str,
    ) -> (MemberStatus, &'static str) {
        match ctx
            .fetch(&format!("get pod {name}"), self.client.get_pod(namespace, name))
            .await
        {
            Ok(Some(pod)) if containers_ready(&pod) => (MemberStatus::Unknown, REASON_LEASE_EXPIRED),
            Ok(_) => (MemberStatus::NotReady, REASON_CONTAINERS_NOT_READY),
            Err(e) if e.is_not_found() => (MemberStatus::NotReady, REASON_CONTAINERS_NOT_READY),
            Err(e) => {
                warn!(member = %name, error = %e, "Failed to get member pod");
                (MemberStatus::Unknown, REASON_LEASE_EXPIRED)
            }
        }
    }
}

#[async_trait]
impl Prober<EtcdMemberStatus> for MemberReadyProber {
    fn name(&self) -> &'static str {
        "member-ready"
    }

    async fn probe(&self, ctx: &ProbeContext, etcd: &Etcd) -> Vec<EtcdMemberStatus> {
        let namespace = etcd.namespace().unwrap_or_default();
        let names = etcd.member_lease_names();
        join_all(
            names
                .iter()
                .map(|name| self.probe_member(ctx, etcd, &namespace, name)),
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }
}

fn member_status(
    name: &str,
    id: Option<String>,
    role: Option<EtcdRole>,
    status: MemberStatus,
    reason: &str,
    stored: Option<&EtcdMemberStatus>,
    now: DateTime<Utc>,
) -> EtcdMemberStatus {
    let last_transition_time = transition_time(
        stored.map(|m| (&m.status, m.reason.as_str(), m.last_transition_time)),
        &status,
        reason,
        now,
    );
    EtcdMemberStatus {
        name: name.to_string(),
        id,
        role,
        status,
        reason: reason.to_string(),
        last_transition_time,
    }
}

fn renew_time(lease: &Lease) -> Option<DateTime<Utc>> {
    lease.spec.as_ref()?.renew_time.as_ref().map(|t| t.0)
}

/// Split a member lease holder identity into member ID and role
///
/// The expected form is `"<memberID>:<role>"`. An unrecognised role is
/// dropped; an identity without a separator yields neither.
pub fn parse_holder_identity(identity: &str) -> (Option<String>, Option<EtcdRole>) {
    match identity.split_once(':') {
        Some((id, role)) if !id.is_empty() => (Some(id.to_string()), role.parse().ok()),
        _ => (None, None),
    }
}

/// Returns true if the pod reports its ContainersReady condition as True
pub fn containers_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == CONTAINERS_READY_CONDITION && c.status == "True")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockMonitorClient;
    use crate::prober::DEFAULT_FETCH_TIMEOUT;
    use k8s_openapi::api::coordination::v1::LeaseSpec;
    use k8s_openapi::api::core::v1::{PodCondition, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime;
    use tokio_util::sync::CancellationToken;
    use warden_common::crd::{EtcdSpec, EtcdStatus};
    use warden_common::Error;

    const NOW: i64 = 10_000;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid timestamp")
    }

    fn ctx() -> ProbeContext {
        ProbeContext::new(at(NOW), CancellationToken::new(), DEFAULT_FETCH_TIMEOUT)
    }

    fn etcd(replicas: i32) -> Etcd {
        let mut etcd = Etcd::new(
            "etcd-main",
            EtcdSpec {
                replicas,
                backup: Default::default(),
            },
        );
        etcd.metadata.namespace = Some("default".to_string());
        etcd
    }

    fn member_lease(renewed_secs_ago: Option<i64>, holder: &str) -> Lease {
        Lease {
            spec: Some(LeaseSpec {
                renew_time: renewed_secs_ago.map(|ago| MicroTime(at(NOW - ago))),
                holder_identity: Some(holder.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod(ready: bool) -> Pod {
        Pod {
            status: Some(PodStatus {
                conditions: Some(vec![PodCondition {
                    type_: CONTAINERS_READY_CONDITION.to_string(),
                    status: if ready { "True" } else { "False" }.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn prober(mock: MockMonitorClient) -> MemberReadyProber {
        MemberReadyProber::new(Arc::new(mock), Arc::new(ProbeConfig::default()))
    }

    async fn probe_single(mock: MockMonitorClient) -> Vec<EtcdMemberStatus> {
        prober(mock).probe(&ctx(), &etcd(1)).await
    }

    mod holder_identity {
        use super::*;

        #[test]
        fn test_parses_id_and_role() {
            assert_eq!(
                parse_holder_identity("8e9e05c52164694d:Leader"),
                (Some("8e9e05c52164694d".to_string()), Some(EtcdRole::Leader))
            );
            assert_eq!(
                parse_holder_identity("abc:Member"),
                (Some("abc".to_string()), Some(EtcdRole::Member))
            );
        }

        #[test]
        fn test_unknown_role_is_dropped() {
            assert_eq!(
                parse_holder_identity("abc:Learner"),
                (Some("abc".to_string()), None)
            );
        }

        #[test]
        fn test_malformed_identity_yields_nothing() {
            assert_eq!(parse_holder_identity("abc"), (None, None));
            assert_eq!(parse_holder_identity(":Leader"), (None, None));
        }
    }

    mod classification {
        use super::*;

        #[tokio::test]
        async fn test_fresh_lease_is_ready() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Ok(Some(member_lease(Some(10), "abc:Leader"))));
            mock.expect_get_pod().never();

            let members = probe_single(mock).await;
            assert_eq!(members.len(), 1);
            assert_eq!(members[0].name, "etcd-main-0");
            assert_eq!(members[0].status, MemberStatus::Ready);
            assert_eq!(members[0].reason, REASON_LEASE_SUCCEEDED);
            assert_eq!(members[0].id.as_deref(), Some("abc"));
            assert_eq!(members[0].role, Some(EtcdRole::Leader));
            assert_eq!(members[0].last_transition_time, at(NOW));
        }

        #[tokio::test]
        async fn test_expired_lease_with_ready_pod_is_unknown() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Ok(Some(member_lease(Some(120), "abc:Member"))));
            mock.expect_get_pod().returning(|_, _| Ok(Some(pod(true))));

            let members = probe_single(mock).await;
            assert_eq!(members[0].status, MemberStatus::Unknown);
            assert_eq!(members[0].reason, REASON_LEASE_EXPIRED);
        }

        #[tokio::test]
        async fn test_expired_lease_with_unready_pod_is_not_ready() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Ok(Some(member_lease(Some(120), "abc:Member"))));
            mock.expect_get_pod().returning(|_, _| Ok(Some(pod(false))));

            let members = probe_single(mock).await;
            assert_eq!(members[0].status, MemberStatus::NotReady);
            assert_eq!(members[0].reason, REASON_CONTAINERS_NOT_READY);
        }

        #[tokio::test]
        async fn test_expired_lease_without_pod_is_not_ready() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Ok(Some(member_lease(Some(120), "abc:Member"))));
            mock.expect_get_pod().returning(|_, _| Ok(None));

            let members = probe_single(mock).await;
            assert_eq!(members[0].status, MemberStatus::NotReady);
            assert_eq!(members[0].reason, REASON_CONTAINERS_NOT_READY);
        }

        #[tokio::test]
        async fn test_expired_lease_with_pod_error_is_unknown() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Ok(Some(member_lease(Some(120), "abc:Member"))));
            mock.expect_get_pod()
                .returning(|_, _| Err(Error::internal("connection reset")));

            let members = probe_single(mock).await;
            assert_eq!(members[0].status, MemberStatus::Unknown);
            assert_eq!(members[0].reason, REASON_LEASE_EXPIRED);
        }

        #[tokio::test]
        async fn test_lease_past_both_thresholds_is_not_ready() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Ok(Some(member_lease(Some(361), "abc:Member"))));
            mock.expect_get_pod().never();

            let members = probe_single(mock).await;
            assert_eq!(members[0].status, MemberStatus::NotReady);
            assert_eq!(members[0].reason, REASON_UNKNOWN_GRACE_PERIOD_EXCEEDED);
        }

        #[tokio::test]
        async fn test_lease_exactly_at_unknown_threshold_is_ready() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Ok(Some(member_lease(Some(60), "abc:Member"))));

            let members = probe_single(mock).await;
            assert_eq!(members[0].status, MemberStatus::Ready);
        }
    }

    mod bootstrapping {
        use super::*;

        #[tokio::test]
        async fn test_absent_lease_emits_nothing() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease().returning(|_, _| Ok(None));

            assert!(probe_single(mock).await.is_empty());
        }

        #[tokio::test]
        async fn test_unrenewed_lease_emits_nothing() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Ok(Some(member_lease(None, "abc:Member"))));

            assert!(probe_single(mock).await.is_empty());
        }

        #[tokio::test]
        async fn test_one_entry_per_replica_in_ordinal_order() {
            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease().times(3).returning(|_, name| match name {
                "etcd-main-1" => Ok(None),
                _ => Ok(Some(member_lease(Some(1), "abc:Member"))),
            });

            let members = prober(mock).probe(&ctx(), &etcd(3)).await;
            let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["etcd-main-0", "etcd-main-2"]);
        }
    }

    mod fetch_errors {
        use super::*;

        /// Story: a lease read fails for a member that was Ready
        ///
        /// The member becomes Unknown but keeps the ID and role recorded by
        /// the last successful probe.
        #[tokio::test]
        async fn story_lease_error_keeps_identity() {
            let mut etcd = etcd(1);
            etcd.status = Some(EtcdStatus {
                members: vec![EtcdMemberStatus {
                    name: "etcd-main-0".to_string(),
                    id: Some("abc".to_string()),
                    role: Some(EtcdRole::Leader),
                    status: MemberStatus::Ready,
                    reason: REASON_LEASE_SUCCEEDED.to_string(),
                    last_transition_time: at(5),
                }],
                ..Default::default()
            });

            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Err(Error::internal("etcd-main-0 lease read failed")));

            let members = prober(mock).probe(&ctx(), &etcd).await;
            assert_eq!(members.len(), 1);
            assert_eq!(members[0].status, MemberStatus::Unknown);
            assert_eq!(members[0].reason, REASON_ERROR_FETCHING_MEMBER_LEASE);
            assert_eq!(members[0].id.as_deref(), Some("abc"));
            assert_eq!(members[0].role, Some(EtcdRole::Leader));
            assert_eq!(members[0].last_transition_time, at(NOW));
        }

        #[tokio::test]
        async fn test_unchanged_member_keeps_transition_time() {
            let mut etcd = etcd(1);
            etcd.status = Some(EtcdStatus {
                members: vec![EtcdMemberStatus {
                    name: "etcd-main-0".to_string(),
                    id: Some("abc".to_string()),
                    role: Some(EtcdRole::Member),
                    status: MemberStatus::Ready,
                    reason: REASON_LEASE_SUCCEEDED.to_string(),
                    last_transition_time: at(5),
                }],
                ..Default::default()
            });

            let mut mock = MockMonitorClient::new();
            mock.expect_get_lease()
                .returning(|_, _| Ok(Some(member_lease(Some(1), "abc:Member"))));

            let members = prober(mock).probe(&ctx(), &etcd).await;
            assert_eq!(members[0].last_transition_time, at(5));
        }
    }
}
