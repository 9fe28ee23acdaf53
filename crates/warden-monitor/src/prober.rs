//! Probe orchestration
//!
//! A [`Prober`] inspects one aspect of an Etcd and returns fresh status
//! values. Probers never fail: every error they meet is folded into an
//! Unknown result, so the [`Monitor`] has no error handling of its own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use warden_common::crd::{Condition, Etcd, EtcdMemberStatus};
use warden_common::Error;

use crate::client::MonitorClient;
use crate::condition::{
    derive_ready_condition, AllMembersReadyProber, BackupReadyProber, DataVolumesReadyProber,
};
use crate::config::ProbeConfig;
use crate::member::MemberReadyProber;

/// Default deadline for a single Kubernetes read
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-pass context shared by all probers
///
/// Carries the single timestamp of the pass and the caller's cancellation
/// signal. Every Kubernetes read goes through [`ProbeContext::fetch`].
#[derive(Clone, Debug)]
pub struct ProbeContext {
    now: DateTime<Utc>,
    cancel: CancellationToken,
    fetch_timeout: Duration,
}

impl ProbeContext {
    /// Create a context for a pass observed at `now`
    pub fn new(now: DateTime<Utc>, cancel: CancellationToken, fetch_timeout: Duration) -> Self {
        Self {
            now,
            cancel,
            fetch_timeout,
        }
    }

    /// Time of this probe pass
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Returns true once the caller has cancelled the pass
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run a read, failing it on cancellation or after the fetch timeout
    ///
    /// Cancellation wins over a read that is ready at the same time, so a
    /// cancelled pass never reports fresh evidence.
    pub async fn fetch<T, F>(&self, operation: &str, read: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::cancelled(operation)),
            result = tokio::time::timeout(self.fetch_timeout, read) => match result {
                Ok(result) => result,
                Err(_) => Err(Error::timeout(operation, self.fetch_timeout)),
            },
        }
    }
}

/// Probes an Etcd and returns one part of its status
///
/// Implementations must not mutate the Etcd or any other object.
#[async_trait]
pub trait Prober<T: Send>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Probe the Etcd; errors are reported through the returned values
    async fn probe(&self, ctx: &ProbeContext, etcd: &Etcd) -> Vec<T>;
}

/// Runs the registered probers against an Etcd
pub struct Monitor {
    condition_probers: Vec<Box<dyn Prober<Condition>>>,
    member_probers: Vec<Box<dyn Prober<EtcdMemberStatus>>>,
}

impl Monitor {
    /// Create a monitor with the standard probers
    ///
    /// Condition probers run in the order BackupReady, DataVolumesReady,
    /// AllMembersReady; the Ready condition is composed from their output.
    pub fn new(client: Arc<dyn MonitorClient>, config: ProbeConfig) -> Self {
        let config = Arc::new(config);
        Self::with_probers(
            vec![
                Box::new(BackupReadyProber::new(client.clone(), config.clone())),
                Box::new(DataVolumesReadyProber::new(
                    client.clone(),
                    config.pvc_warning_event_limit,
                )),
                Box::new(AllMembersReadyProber),
            ],
            vec![Box::new(MemberReadyProber::new(client, config))],
        )
    }

    /// Create a monitor with explicit probers, in registration order
    pub fn with_probers(
        condition_probers: Vec<Box<dyn Prober<Condition>>>,
        member_probers: Vec<Box<dyn Prober<EtcdMemberStatus>>>,
    ) -> Self {
        Self {
            condition_probers,
            member_probers,
        }
    }

    /// Probe all health conditions of an Etcd
    ///
    /// Returns the probers' conditions in registration order followed by
    /// the Ready condition composed from them.
    pub async fn probe_conditions(&self, ctx: &ProbeContext, etcd: &Etcd) -> Vec<Condition> {
        let mut conditions = run_probers(&self.condition_probers, ctx, etcd).await;
        let ready = derive_ready_condition(etcd, &conditions, ctx.now());
        conditions.push(ready);
        conditions
    }

    /// Probe the readiness of each member of an Etcd
    pub async fn probe_members(&self, ctx: &ProbeContext, etcd: &Etcd) -> Vec<EtcdMemberStatus> {
        run_probers(&self.member_probers, ctx, etcd).await
    }

    /// Probe members, then conditions against the fresh member list
    ///
    /// Conditions derived from `status.members` (AllMembersReady and so
    /// Ready) see the members observed in this pass rather than the stored
    /// ones. Stored conditions are untouched, so transitions are still
    /// tracked against what was last written.
    pub async fn probe(
        &self,
        ctx: &ProbeContext,
        etcd: &Etcd,
    ) -> (Vec<Condition>, Vec<EtcdMemberStatus>) {
        let members = self.probe_members(ctx, etcd).await;

        let mut observed = etcd.clone();
        observed.status.get_or_insert_with(Default::default).members = members.clone();

        let conditions = self.probe_conditions(ctx, &observed).await;
        (conditions, members)
    }
}

/// Run probers concurrently and concatenate their output in registration order
async fn run_probers<T: Send + 'static>(
    probers: &[Box<dyn Prober<T>>],
    ctx: &ProbeContext,
    etcd: &Etcd,
) -> Vec<T> {
    let outputs = join_all(probers.iter().map(|p| async move {
        let output = p.probe(ctx, etcd).await;
        debug!(
            etcd = %etcd.name_any(),
            prober = p.name(),
            results = output.len(),
            "Probe finished"
        );
        output
    }))
    .await;
    outputs.into_iter().flatten().collect()
}
