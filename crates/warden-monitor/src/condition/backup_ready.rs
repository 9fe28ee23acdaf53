//! Snapshot backup health
//!
//! The backup sidecar renews one lease after every full snapshot and another
//! after every delta snapshot. A lease that stopped being renewed means the
//! corresponding snapshots stopped being taken.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::Lease;
use kube::ResourceExt;
use tracing::{debug, warn};

use warden_common::crd::{Condition, ConditionStatus, ConditionType, Etcd};

use super::aggregate::{aggregate, AggregateReasons};
use super::{elapsed_since, format_duration, track};
use crate::client::MonitorClient;
use crate::config::ProbeConfig;
use crate::prober::{ProbeContext, Prober};

/// Last snapshot was taken within the staleness threshold
pub const REASON_SNAPSHOT_UP_TO_DATE: &str = "SnapshotUpToDate";
/// Last snapshot is older than the staleness threshold
pub const REASON_SNAPSHOT_STALE: &str = "SnapshotStale";
/// The snapshot lease exists but was never renewed
pub const REASON_NO_SNAPSHOT_TAKEN_YET: &str = "NoSnapshotTakenYet";
/// The snapshot lease does not exist
pub const REASON_SNAPSHOT_LEASE_NOT_FOUND: &str = "SnapshotLeaseNotFound";
/// Backup health could not be determined
pub const REASON_BACKUP_READY_UNKNOWN: &str = "BackupReadyUnknown";
/// Full and delta snapshots are both up to date
pub const REASON_BACKUP_SUCCEEDED: &str = "BackupSucceeded";
/// At least one snapshot kind is stale
pub const REASON_BACKUP_FAILED: &str = "BackupFailed";

const BACKUP_REASONS: AggregateReasons = AggregateReasons {
    healthy: REASON_BACKUP_SUCCEEDED,
    degraded: REASON_BACKUP_FAILED,
    unknown: REASON_BACKUP_READY_UNKNOWN,
};

/// Kind of snapshot tracked by a snapshot lease
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotCadence {
    /// Scheduled full snapshot
    Full,
    /// Periodic incremental snapshot
    Delta,
}

impl SnapshotCadence {
    /// Condition reporting this cadence
    pub fn condition_type(self) -> ConditionType {
        match self {
            Self::Full => ConditionType::FullSnapshotBackupReady,
            Self::Delta => ConditionType::DeltaSnapshotBackupReady,
        }
    }

    /// Name of the lease renewed after each snapshot of this cadence
    pub fn lease_name(self, etcd: &Etcd) -> String {
        match self {
            Self::Full => etcd.full_snapshot_lease_name(),
            Self::Delta => etcd.delta_snapshot_lease_name(),
        }
    }

    /// Maximum snapshot age before the snapshot counts as stale
    pub fn staleness_threshold(self, config: &ProbeConfig) -> Duration {
        match self {
            Self::Full => config.full_snapshot_staleness,
            Self::Delta => config.delta_snapshot_staleness,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Delta => "delta",
        }
    }
}

impl fmt::Display for SnapshotCadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "Full"),
            Self::Delta => write!(f, "Delta"),
        }
    }
}

/// What a snapshot lease says about the last snapshot
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotHeartbeat {
    /// When the last snapshot was recorded, `None` if never
    pub renewed_at: Option<DateTime<Utc>>,
    /// Revision covered by the last snapshot, if recorded
    pub revision: Option<String>,
    /// When the lease was created
    pub created_at: Option<DateTime<Utc>>,
}

/// Reads snapshot evidence off a snapshot lease
///
/// The backup sidecar decides how it encodes a snapshot on the lease;
/// implementations of this trait decode it.
pub trait SnapshotEvidence: Send + Sync {
    /// Extract the heartbeat recorded on the lease
    fn heartbeat(&self, lease: &Lease) -> SnapshotHeartbeat;
}

/// Default evidence: `renewTime` is the snapshot time, `holderIdentity` the revision
#[derive(Clone, Copy, Debug, Default)]
pub struct LeaseRenewalEvidence;

impl SnapshotEvidence for LeaseRenewalEvidence {
    fn heartbeat(&self, lease: &Lease) -> SnapshotHeartbeat {
        let spec = lease.spec.as_ref();
        SnapshotHeartbeat {
            renewed_at: spec.and_then(|s| s.renew_time.as_ref()).map(|t| t.0),
            revision: spec.and_then(|s| s.holder_identity.clone()),
            created_at: lease.metadata.creation_timestamp.as_ref().map(|t| t.0),
        }
    }
}

/// Probes the full and delta snapshot leases and composes BackupReady
///
/// Emits nothing when the Etcd has no backup store.
pub struct BackupReadyProber {
    client: Arc<dyn MonitorClient>,
    config: Arc<ProbeConfig>,
    evidence: Arc<dyn SnapshotEvidence>,
}

impl BackupReadyProber {
    /// Create a prober that reads lease renewals as snapshot evidence
    pub fn new(client: Arc<dyn MonitorClient>, config: Arc<ProbeConfig>) -> Self {
        Self::with_evidence(client, config, Arc::new(LeaseRenewalEvidence))
    }

    /// Create a prober with a custom evidence reader
    pub fn with_evidence(
        client: Arc<dyn MonitorClient>,
        config: Arc<ProbeConfig>,
        evidence: Arc<dyn SnapshotEvidence>,
    ) -> Self {
        Self {
            client,
            config,
            evidence,
        }
    }

    async fn probe_snapshot(
        &self,
        ctx: &ProbeContext,
        etcd: &Etcd,
        cadence: SnapshotCadence,
    ) -> Condition {
        let now = ctx.now();
        let type_ = cadence.condition_type();
        let namespace = etcd.namespace().unwrap_or_default();
        let lease_name = cadence.lease_name(etcd);

        let fetched = ctx
            .fetch(
                &format!("get lease {lease_name}"),
                self.client.get_lease(&namespace, &lease_name),
            )
            .await;

        let candidate = match fetched {
            Ok(Some(lease)) => {
                let heartbeat = self.evidence.heartbeat(&lease);
                let threshold = cadence.staleness_threshold(&self.config);
                let (status, reason, message) = classify(cadence, &heartbeat, threshold, now);
                Condition::new(type_, status, reason, message, now)
            }
            Ok(None) => lease_not_found(cadence, now),
            Err(e) if e.is_not_found() => lease_not_found(cadence, now),
            Err(e) => {
                warn!(
                    etcd = %etcd.name_any(),
                    lease = %lease_name,
                    error = %e,
                    "Failed to get snapshot lease"
                );
                Condition::new(
                    type_,
                    ConditionStatus::Unknown,
                    REASON_BACKUP_READY_UNKNOWN,
                    format!("Error getting {} snapshot lease: {e}", cadence.as_str()),
                    now,
                )
            }
        };

        track(etcd, candidate, now)
    }
}

#[async_trait]
impl Prober<Condition> for BackupReadyProber {
    fn name(&self) -> &'static str {
        "backup-ready"
    }

    async fn probe(&self, ctx: &ProbeContext, etcd: &Etcd) -> Vec<Condition> {
        if !etcd.is_backup_store_enabled() {
            debug!(etcd = %etcd.name_any(), "Backup store not configured, skipping backup probes");
            return Vec::new();
        }

        let (full, delta) = futures::join!(
            self.probe_snapshot(ctx, etcd, SnapshotCadence::Full),
            self.probe_snapshot(ctx, etcd, SnapshotCadence::Delta),
        );
        let backup = derive_backup_ready_condition(etcd, &full, &delta, ctx.now());
        vec![full, delta, backup]
    }
}

/// Compose BackupReady from the full and delta snapshot conditions
///
/// The result is transition-tracked against the stored BackupReady.
pub fn derive_backup_ready_condition(
    etcd: &Etcd,
    full: &Condition,
    delta: &Condition,
    now: DateTime<Utc>,
) -> Condition {
    let candidate = aggregate(
        ConditionType::BackupReady,
        &[full, delta],
        &BACKUP_REASONS,
        "Full and delta snapshots are up to date",
        now,
    );
    track(etcd, candidate, now)
}

fn lease_not_found(cadence: SnapshotCadence, now: DateTime<Utc>) -> Condition {
    Condition::new(
        cadence.condition_type(),
        ConditionStatus::Unknown,
        REASON_SNAPSHOT_LEASE_NOT_FOUND,
        format!("{cadence} snapshot lease not found"),
        now,
    )
}

/// Classify a heartbeat against the staleness threshold
fn classify(
    cadence: SnapshotCadence,
    heartbeat: &SnapshotHeartbeat,
    threshold: Duration,
    now: DateTime<Utc>,
) -> (ConditionStatus, &'static str, String) {
    let Some(renewed_at) = heartbeat.renewed_at else {
        let lease_age = heartbeat.created_at.map(|t| elapsed_since(t, now));
        return match lease_age {
            Some(age) if age > threshold => (
                ConditionStatus::False,
                REASON_SNAPSHOT_STALE,
                format!(
                    "No {} snapshot taken since the lease was created {} ago, exceeding the threshold of {}",
                    cadence.as_str(),
                    format_duration(age),
                    format_duration(threshold)
                ),
            ),
            _ => (
                ConditionStatus::Unknown,
                REASON_NO_SNAPSHOT_TAKEN_YET,
                format!("No {} snapshot has been taken yet", cadence.as_str()),
            ),
        };
    };

    let age = elapsed_since(renewed_at, now);
    if age <= threshold {
        let revision = heartbeat
            .revision
            .as_deref()
            .map(|r| format!(" at revision {r}"))
            .unwrap_or_default();
        (
            ConditionStatus::True,
            REASON_SNAPSHOT_UP_TO_DATE,
            format!(
                "{cadence} snapshot taken {} ago{revision}",
                format_duration(age)
            ),
        )
    } else {
        (
            ConditionStatus::False,
            REASON_SNAPSHOT_STALE,
            format!(
                "Last {} snapshot was taken {} ago, exceeding the threshold of {}",
                cadence.as_str(),
                format_duration(age),
                format_duration(threshold)
            ),
        )
    }
}
