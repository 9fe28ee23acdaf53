//! Etcd status controller
//!
//! Probes each Etcd on a fixed interval and records the result in its
//! status subresource:
//!
//! 1. Probe members, then conditions over those members, with one shared
//!    timestamp
//! 2. Merge the fresh conditions into the stored ones by type
//! 3. Patch `.status`
//! 4. Emit an Event for every condition whose status just changed
//!
//! The controller never acts on the conditions it writes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[cfg(test)]
use mockall::automock;

use warden_common::crd::{Condition, ConditionType, Etcd, EtcdMemberStatus, EtcdStatus};
use warden_common::events::{EventPublisher, KubeEventPublisher};
use warden_common::{Error, ReconcileError, REQUEUE_ERROR_SECS, STATUS_FIELD_MANAGER};
use warden_monitor::{KubeMonitorClient, Monitor, ProbeContext};

use crate::config::OperatorConfig;

/// Name reported as the source of Kubernetes Events
pub const CONTROLLER_NAME: &str = "warden-operator";

/// Trait abstracting writes to the Etcd status subresource
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusWriter: Send + Sync {
    /// Replace the status of an Etcd
    async fn write_status(&self, etcd: &Etcd, status: &EtcdStatus) -> Result<(), Error>;
}

/// Writes status with a JSON merge patch on the status subresource
pub struct KubeStatusWriter {
    client: Client,
}

impl KubeStatusWriter {
    /// Create a new KubeStatusWriter wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusWriter for KubeStatusWriter {
    async fn write_status(&self, etcd: &Etcd, status: &EtcdStatus) -> Result<(), Error> {
        let name = etcd.name_any();
        let namespace = etcd
            .namespace()
            .ok_or_else(|| Error::validation_for(&name, "Etcd has no namespace"))?;

        // Members are always sent so that a shrinking list replaces the stored one
        let mut status_value = serde_json::to_value(status)?;
        status_value["members"] = serde_json::to_value(&status.members)?;
        let patch = serde_json::json!({ "status": status_value });

        let api: Api<Etcd> = Api::namespaced(self.client.clone(), &namespace);
        api.patch_status(
            &name,
            &PatchParams::apply(STATUS_FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

/// Controller context shared by all reconciles
pub struct Context {
    /// Probes run on every reconcile
    pub monitor: Monitor,
    /// Status subresource writer (trait object for testability)
    pub status: Arc<dyn StatusWriter>,
    /// Event publisher for condition transitions
    pub events: Arc<dyn EventPublisher>,
    /// Requeue interval after a successful probe pass
    pub probe_interval: Duration,
    /// Deadline for a single Kubernetes read
    pub fetch_timeout: Duration,
    /// Cancelled when the operator shuts down; in-flight probes are abandoned
    pub shutdown: CancellationToken,
}

impl Context {
    /// Create a context backed by the real Kubernetes API
    pub fn new(client: Client, config: &OperatorConfig, shutdown: CancellationToken) -> Self {
        let monitor = Monitor::new(
            Arc::new(KubeMonitorClient::new(client.clone())),
            config.to_probe_config(),
        );
        Self {
            monitor,
            status: Arc::new(KubeStatusWriter::new(client.clone())),
            events: Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
            probe_interval: config.probe_interval(),
            fetch_timeout: config.fetch_timeout(),
            shutdown,
        }
    }
}

/// Reconcile an Etcd: probe it and write its status
pub async fn reconcile(etcd: Arc<Etcd>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let name = etcd.name_any();
    if etcd.namespace().is_none() {
        return Err(ReconcileError::Validation(format!(
            "Etcd {name} has no namespace"
        )));
    }

    info!(etcd = %name, "Probing Etcd health");

    let now = Utc::now();
    let probe_ctx = ProbeContext::new(now, ctx.shutdown.child_token(), ctx.fetch_timeout);
    let (conditions, members) = ctx.monitor.probe(&probe_ctx, &etcd).await;

    let status = build_status(&etcd, conditions.clone(), members, now);
    ctx.status.write_status(&etcd, &status).await?;

    publish_transitions(&etcd, &conditions, now, ctx.events.as_ref()).await;

    debug!(
        etcd = %name,
        ready = ?status.ready,
        conditions = status.conditions.len(),
        members = status.members.len(),
        "Etcd status written"
    );
    Ok(Action::requeue(ctx.probe_interval))
}

/// Error policy for the Etcd controller
pub fn error_policy(etcd: Arc<Etcd>, error: &ReconcileError, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        etcd = %etcd.name_any(),
        "reconciliation failed"
    );
    Action::requeue(Duration::from_secs(REQUEUE_ERROR_SECS))
}

/// Build the status to write from the stored status and a probe pass
///
/// Conditions are merged by type: stored positions are kept, new types are
/// appended, and stored types not probed this pass (such as backup
/// conditions after the store was removed) are retained. Members are
/// replaced wholesale.
pub fn build_status(
    etcd: &Etcd,
    conditions: Vec<Condition>,
    members: Vec<EtcdMemberStatus>,
    now: DateTime<Utc>,
) -> EtcdStatus {
    let mut status = etcd.status.clone().unwrap_or_default();
    status.merge_conditions(conditions);
    status.members = members;
    status.ready = status.condition(ConditionType::Ready).map(Condition::is_true);
    status.observed_generation = etcd.metadata.generation;
    status.last_probe_time = Some(now);
    status
}

/// Publish one Event per condition whose status changed in this pass
async fn publish_transitions(
    etcd: &Etcd,
    fresh: &[Condition],
    now: DateTime<Utc>,
    events: &dyn EventPublisher,
) {
    let resource_ref = etcd.object_ref(&());
    for condition in fresh.iter().filter(|c| c.last_transition_time == now) {
        let previous = etcd
            .status
            .as_ref()
            .and_then(|s| s.condition(condition.type_))
            .map(|c| c.status);
        if previous == Some(condition.status) {
            continue;
        }

        events
            .publish_transition(&resource_ref, previous, condition)
            .await;
    }
}
