//! Ready, composed from the freshly probed conditions

use chrono::{DateTime, Utc};

use warden_common::crd::{Condition, ConditionType, Etcd};

use super::aggregate::{aggregate, AggregateReasons};
use super::track;

/// Every constituent condition is True
pub const REASON_CLUSTER_READY: &str = "ClusterReady";
/// A constituent condition is False
pub const REASON_CLUSTER_NOT_READY: &str = "ClusterNotReady";
/// A constituent condition is Unknown or could not be checked
pub const REASON_CLUSTER_READY_UNKNOWN: &str = "ClusterReadyUnknown";
/// No constituent condition was probed
pub const REASON_NO_CONSTITUENT_CONDITIONS: &str = "NoConstituentConditions";

const READY_REASONS: AggregateReasons = AggregateReasons {
    healthy: REASON_CLUSTER_READY,
    degraded: REASON_CLUSTER_NOT_READY,
    unknown: REASON_CLUSTER_READY_UNKNOWN,
};

const CONSTITUENTS: [ConditionType; 3] = [
    ConditionType::AllMembersReady,
    ConditionType::BackupReady,
    ConditionType::DataVolumesReady,
];

/// Compose Ready from the conditions produced in this probe pass
///
/// Ready is the worst of AllMembersReady, BackupReady and DataVolumesReady
/// among `fresh`. BackupReady only counts when it was probed, so a cluster
/// without a backup store can still be Ready. The result is
/// transition-tracked against the stored Ready.
pub fn derive_ready_condition(etcd: &Etcd, fresh: &[Condition], now: DateTime<Utc>) -> Condition {
    let constituents: Vec<&Condition> = CONSTITUENTS
        .iter()
        .filter_map(|type_| fresh.iter().find(|c| c.type_ == *type_))
        .collect();

    let mut candidate = aggregate(
        ConditionType::Ready,
        &constituents,
        &READY_REASONS,
        "All health conditions are True",
        now,
    );
    if constituents.is_empty() {
        candidate.reason = REASON_NO_CONSTITUENT_CONDITIONS.to_string();
    }

    track(etcd, candidate, now)
}
