//! AllMembersReady from the recorded member statuses

use async_trait::async_trait;

use warden_common::crd::{Condition, ConditionStatus, ConditionType, Etcd, MemberStatus};

use super::track;
use crate::prober::{ProbeContext, Prober};

/// No member status has been recorded yet
pub const REASON_NO_MEMBERS_IN_STATUS: &str = "NoMembersInStatus";
/// A member is missing or not ready
pub const REASON_NOT_ALL_MEMBERS_READY: &str = "NotAllMembersReady";
/// Every expected member is ready
pub const REASON_ALL_MEMBERS_READY: &str = "AllMembersReady";

/// Reports whether every member recorded in status is ready
///
/// Reads only the Etcd itself, so it never touches the API server.
pub struct AllMembersReadyProber;

#[async_trait]
impl Prober<Condition> for AllMembersReadyProber {
    fn name(&self) -> &'static str {
        "all-members-ready"
    }

    async fn probe(&self, ctx: &ProbeContext, etcd: &Etcd) -> Vec<Condition> {
        let now = ctx.now();
        let members = etcd.members();
        let expected = usize::try_from(etcd.spec.replicas).unwrap_or_default();

        let (status, reason, message) = if members.is_empty() {
            (
                ConditionStatus::Unknown,
                REASON_NO_MEMBERS_IN_STATUS,
                "Cannot determine readiness since status has no members".to_string(),
            )
        } else {
            let not_ready: Vec<&str> = members
                .iter()
                .filter(|m| m.status != MemberStatus::Ready)
                .map(|m| m.name.as_str())
                .collect();

            if not_ready.is_empty() && members.len() >= expected {
                (
                    ConditionStatus::True,
                    REASON_ALL_MEMBERS_READY,
                    "All members are ready".to_string(),
                )
            } else if not_ready.is_empty() {
                (
                    ConditionStatus::False,
                    REASON_NOT_ALL_MEMBERS_READY,
                    format!(
                        "Only {} of {expected} members reported in status",
                        members.len()
                    ),
                )
            } else {
                (
                    ConditionStatus::False,
                    REASON_NOT_ALL_MEMBERS_READY,
                    format!("Members not ready: {}", not_ready.join(", ")),
                )
            }
        };

        let candidate = Condition::new(ConditionType::AllMembersReady, status, reason, message, now);
        vec![track(etcd, candidate, now)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::DEFAULT_FETCH_TIMEOUT;
    use chrono::{DateTime, Utc};
    use tokio_util::sync::CancellationToken;
    use warden_common::crd::{EtcdMemberStatus, EtcdSpec, EtcdStatus};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).expect("valid timestamp")
    }

    fn member(ordinal: usize, status: MemberStatus) -> EtcdMemberStatus {
        EtcdMemberStatus {
            name: format!("etcd-main-{ordinal}"),
            id: None,
            role: None,
            status,
            reason: "LeaseSucceeded".to_string(),
            last_transition_time: at(0),
        }
    }

    fn etcd_with_members(replicas: i32, members: Vec<EtcdMemberStatus>) -> Etcd {
        let mut etcd = Etcd::new(
            "etcd-main",
            EtcdSpec {
                replicas,
                backup: Default::default(),
            },
        );
        etcd.status = Some(EtcdStatus {
            members,
            ..Default::default()
        });
        etcd
    }

    async fn probe(etcd: &Etcd) -> Condition {
        let ctx = ProbeContext::new(at(50), CancellationToken::new(), DEFAULT_FETCH_TIMEOUT);
        let mut conditions = AllMembersReadyProber.probe(&ctx, etcd).await;
        assert_eq!(conditions.len(), 1);
        conditions.remove(0)
    }

    #[tokio::test]
    async fn test_no_members_is_unknown() {
        let condition = probe(&etcd_with_members(3, vec![])).await;
        assert_eq!(condition.status, ConditionStatus::Unknown);
        assert_eq!(condition.reason, REASON_NO_MEMBERS_IN_STATUS);
    }

    #[tokio::test]
    async fn test_all_ready_is_true() {
        let members = (0..3).map(|i| member(i, MemberStatus::Ready)).collect();
        let condition = probe(&etcd_with_members(3, members)).await;
        assert_eq!(condition.status, ConditionStatus::True);
        assert_eq!(condition.reason, REASON_ALL_MEMBERS_READY);
        assert_eq!(condition.last_transition_time, at(50));
    }

    #[tokio::test]
    async fn test_missing_member_is_false() {
        let members = (0..2).map(|i| member(i, MemberStatus::Ready)).collect();
        let condition = probe(&etcd_with_members(3, members)).await;
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, REASON_NOT_ALL_MEMBERS_READY);
        assert_eq!(condition.message, "Only 2 of 3 members reported in status");
    }

    #[tokio::test]
    async fn test_unready_members_are_named() {
        let members = vec![
            member(0, MemberStatus::Ready),
            member(1, MemberStatus::Unknown),
            member(2, MemberStatus::NotReady),
        ];
        let condition = probe(&etcd_with_members(3, members)).await;
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.message, "Members not ready: etcd-main-1, etcd-main-2");
    }
}
