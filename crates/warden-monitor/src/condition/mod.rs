//! Health condition probers and composers
//!
//! - **backup_ready**: FullSnapshotBackupReady, DeltaSnapshotBackupReady and
//!   their BackupReady aggregate, from the snapshot leases
//! - **data_volumes_ready**: DataVolumesReady, from PVC warning events
//! - **all_members_ready**: AllMembersReady, from the recorded member statuses
//! - **cluster_ready**: Ready, composed from the conditions above
//! - **transition**: the single place transition timestamps are computed
//! - **aggregate**: worst-of combination shared by the composers

mod aggregate;
mod all_members_ready;
mod backup_ready;
mod cluster_ready;
mod data_volumes_ready;
mod transition;

use std::time::Duration;

use chrono::{DateTime, Utc};

use warden_common::crd::{Condition, ConditionType, Etcd};

pub use aggregate::{aggregate, severity, worst_of, AggregateReasons};
pub use all_members_ready::AllMembersReadyProber;
pub use backup_ready::{
    derive_backup_ready_condition, BackupReadyProber, LeaseRenewalEvidence, SnapshotCadence,
    SnapshotEvidence, SnapshotHeartbeat,
};
pub use cluster_ready::derive_ready_condition;
pub use data_volumes_ready::{fetch_pvc_warning_messages, DataVolumesReadyProber};
pub use transition::{derive_transition, track};
pub(crate) use transition::transition_time;

/// Machine-readable condition reasons
pub mod reasons {
    pub use super::all_members_ready::{
        REASON_ALL_MEMBERS_READY, REASON_NOT_ALL_MEMBERS_READY, REASON_NO_MEMBERS_IN_STATUS,
    };
    pub use super::backup_ready::{
        REASON_BACKUP_FAILED, REASON_BACKUP_READY_UNKNOWN, REASON_BACKUP_SUCCEEDED,
        REASON_NO_SNAPSHOT_TAKEN_YET, REASON_SNAPSHOT_LEASE_NOT_FOUND, REASON_SNAPSHOT_STALE,
        REASON_SNAPSHOT_UP_TO_DATE,
    };
    pub use super::cluster_ready::{
        REASON_CLUSTER_NOT_READY, REASON_CLUSTER_READY, REASON_CLUSTER_READY_UNKNOWN,
        REASON_NO_CONSTITUENT_CONDITIONS,
    };
    pub use super::data_volumes_ready::{
        REASON_ERROR_FETCHING_PVC_EVENTS, REASON_ERROR_FETCHING_STATEFULSET,
        REASON_NO_WARNINGS_FOUND_FOR_PVCS, REASON_STATEFULSET_NOT_FOUND,
        REASON_WARNINGS_FOUND_FOR_PVCS,
    };
}

/// Get the condition of the given type recorded on the Etcd, if any
pub fn get_condition_by_type(etcd: &Etcd, type_: ConditionType) -> Option<&Condition> {
    etcd.conditions().iter().find(|c| c.type_ == type_)
}

/// Time elapsed from `since` to `now`, zero if `since` is in the future
pub(crate) fn elapsed_since(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or_default()
}

/// Format a duration as e.g. "1h2m3s", to the second
pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || out.is_empty() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}
