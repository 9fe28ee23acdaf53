//! Etcd Custom Resource Definition
//!
//! An Etcd describes one clustered etcd deployment. The operator runs it as
//! a StatefulSet with one member lease per pod, and optionally snapshots it
//! to a backup store. Snapshot health is signalled through two leases (full
//! and delta cadence) renewed by the backup sidecar.

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, ConditionType, EtcdMemberStatus};

/// Suffix of the lease renewed after each full snapshot
pub const FULL_SNAPSHOT_LEASE_SUFFIX: &str = "full-snap";

/// Suffix of the lease renewed after each delta snapshot
pub const DELTA_SNAPSHOT_LEASE_SUFFIX: &str = "delta-snap";

/// Object store provider for snapshots
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum StorageProvider {
    /// Amazon S3
    #[default]
    S3,
    /// Google Cloud Storage
    Gcs,
    /// Azure Blob Storage
    Abs,
    /// OpenStack Swift
    Swift,
    /// Local filesystem (testing only)
    Local,
}

/// Backup store configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreSpec {
    /// Object store provider
    #[serde(default)]
    pub provider: StorageProvider,

    /// Bucket or container name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    /// Key prefix for snapshots of this cluster
    pub prefix: String,

    /// Secret holding object store credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
}

/// Backup configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// Where snapshots are uploaded; backups are disabled without a store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreSpec>,

    /// Cron schedule for full snapshots
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_snapshot_schedule: Option<String>,

    /// Period between delta snapshots (e.g., "20s")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_snapshot_period: Option<String>,
}

/// Specification for an Etcd cluster
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "warden.dev",
    version = "v1alpha1",
    kind = "Etcd",
    plural = "etcds",
    shortname = "etcd",
    namespaced,
    status = "EtcdStatus",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Backup","type":"string","jsonPath":".status.conditions[?(@.type==\"BackupReady\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EtcdSpec {
    /// Number of etcd members
    pub replicas: i32,

    /// Snapshot backup configuration
    #[serde(default)]
    pub backup: BackupSpec,
}

/// Observed state of an Etcd cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EtcdStatus {
    /// Health conditions, unique by type, in insertion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Per-member readiness
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<EtcdMemberStatus>,

    /// Mirrors the Ready condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,

    /// Generation of the spec that was last probed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Time of the last probe pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_probe_time: Option<DateTime<Utc>>,
}

impl EtcdStatus {
    /// Get the condition of the given type, if recorded
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Merge freshly probed conditions into the recorded set
    ///
    /// A condition replaces the recorded one of the same type in place; new
    /// types are appended. Recorded types absent from `fresh` are kept.
    pub fn merge_conditions(&mut self, fresh: impl IntoIterator<Item = Condition>) {
        for condition in fresh {
            match self
                .conditions
                .iter_mut()
                .find(|c| c.type_ == condition.type_)
            {
                Some(existing) => *existing = condition,
                None => self.conditions.push(condition),
            }
        }
    }

    /// Get the recorded status of the named member
    pub fn member(&self, name: &str) -> Option<&EtcdMemberStatus> {
        self.members.iter().find(|m| m.name == name)
    }
}

impl Etcd {
    /// Returns true if snapshots are uploaded to a backup store
    pub fn is_backup_store_enabled(&self) -> bool {
        self.spec.backup.store.is_some()
    }

    /// Recorded conditions (empty before the first probe)
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }

    /// Recorded member statuses (empty before the first probe)
    pub fn members(&self) -> &[EtcdMemberStatus] {
        self.status
            .as_ref()
            .map(|s| s.members.as_slice())
            .unwrap_or_default()
    }

    /// Name of the StatefulSet running the members
    pub fn statefulset_name(&self) -> String {
        self.name_any()
    }

    /// Name of the lease renewed after each full snapshot
    pub fn full_snapshot_lease_name(&self) -> String {
        format!("{}-{}", self.name_any(), FULL_SNAPSHOT_LEASE_SUFFIX)
    }

    /// Name of the lease renewed after each delta snapshot
    pub fn delta_snapshot_lease_name(&self) -> String {
        format!("{}-{}", self.name_any(), DELTA_SNAPSHOT_LEASE_SUFFIX)
    }

    /// Names of the member leases, one per replica
    ///
    /// A member lease shares its name with the member's pod.
    pub fn member_lease_names(&self) -> Vec<String> {
        let name = self.name_any();
        (0..self.spec.replicas.max(0))
            .map(|ordinal| format!("{name}-{ordinal}"))
            .collect()
    }
}
