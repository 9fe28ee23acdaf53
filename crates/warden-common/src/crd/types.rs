//! Health condition and member status types for the Etcd CRD

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Health dimension reported by a condition
///
/// This is a closed catalog: the monitor never produces any other type.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionType {
    /// The etcd cluster as a whole is ready
    Ready,
    /// Every member of the etcd cluster is ready
    AllMembersReady,
    /// Aggregate of the full and delta snapshot backup conditions
    BackupReady,
    /// Full snapshots are being taken on schedule
    FullSnapshotBackupReady,
    /// Delta snapshots are being taken on schedule
    DeltaSnapshotBackupReady,
    /// The data volumes are free of warning events
    DataVolumesReady,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::AllMembersReady => write!(f, "AllMembersReady"),
            Self::BackupReady => write!(f, "BackupReady"),
            Self::FullSnapshotBackupReady => write!(f, "FullSnapshotBackupReady"),
            Self::DeltaSnapshotBackupReady => write!(f, "DeltaSnapshotBackupReady"),
            Self::DataVolumesReady => write!(f, "DataVolumesReady"),
        }
    }
}

/// Condition status
///
/// `Unknown` and `ConditionCheckError` mean the status could not be
/// determined, not that it was determined to be bad. There is
/// no `Default`: every condition must be given a status explicitly.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionStatus {
    /// Condition is met
    True,
    /// Condition is not met
    False,
    /// Condition could not be determined
    Unknown,
    /// Condition was seen true, failed, but is within its failure threshold
    Progressing,
    /// Evaluating the condition failed
    ConditionCheckError,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
            Self::Progressing => write!(f, "Progressing"),
            Self::ConditionCheckError => write!(f, "ConditionCheckError"),
        }
    }
}

/// Kubernetes-style condition describing one health dimension of an Etcd
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: ConditionType,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Last time the status or reason changed
    pub last_transition_time: DateTime<Utc>,

    /// Last time the condition was probed
    pub last_update_time: DateTime<Utc>,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,
}

impl Condition {
    /// Create a condition observed at `now`
    ///
    /// Both timestamps are set to `now`. Probes pass the result through the
    /// transition tracker, which carries the previous transition time forward
    /// when nothing changed.
    pub fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            type_,
            status,
            last_transition_time: now,
            last_update_time: now,
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Returns true if the condition status is True
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Role of an etcd member in the raft group
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum EtcdRole {
    /// Current raft leader
    Leader,
    /// Follower
    Member,
}

impl std::str::FromStr for EtcdRole {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Leader" => Ok(Self::Leader),
            "Member" => Ok(Self::Member),
            _ => Err(crate::Error::validation(format!(
                "invalid etcd role: {s}, expected Leader or Member"
            ))),
        }
    }
}

impl std::fmt::Display for EtcdRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leader => write!(f, "Leader"),
            Self::Member => write!(f, "Member"),
        }
    }
}

/// Readiness of a single etcd member
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum MemberStatus {
    /// Member heartbeat is current
    Ready,
    /// Member is known to be down
    NotReady,
    /// Member heartbeat expired, cause undetermined
    Unknown,
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::NotReady => write!(f, "NotReady"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Observed state of one etcd member
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EtcdMemberStatus {
    /// Member name (same as its pod and member lease)
    pub name: String,

    /// Member ID in hex, as reported by the member lease
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Raft role of the member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<EtcdRole>,

    /// Readiness of the member
    pub status: MemberStatus,

    /// Machine-readable reason for the status
    pub reason: String,

    /// Last time the status or reason changed
    pub last_transition_time: DateTime<Utc>,
}
