//! Data volume health from PVC warning events

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Event, PersistentVolumeClaim};
use kube::ResourceExt;
use tracing::warn;

use warden_common::crd::{Condition, ConditionStatus, ConditionType, Etcd};
use warden_common::Error;

use super::track;
use crate::client::MonitorClient;
use crate::prober::{ProbeContext, Prober};

/// The StatefulSet does not exist
pub const REASON_STATEFULSET_NOT_FOUND: &str = "StatefulSetNotFound";
/// The StatefulSet could not be read
pub const REASON_ERROR_FETCHING_STATEFULSET: &str = "ErrorFetchingStatefulSet";
/// PVCs or their events could not be listed
pub const REASON_ERROR_FETCHING_PVC_EVENTS: &str = "ErrorFetchingPVCEvents";
/// At least one PVC has warning events
pub const REASON_WARNINGS_FOUND_FOR_PVCS: &str = "WarningsFoundForPVCs";
/// No PVC has warning events
pub const REASON_NO_WARNINGS_FOUND_FOR_PVCS: &str = "NoWarningsFoundForPVCs";

const PVC_PHASE_BOUND: &str = "Bound";

/// Reports DataVolumesReady from warning events on the members' PVCs
pub struct DataVolumesReadyProber {
    client: Arc<dyn MonitorClient>,
    event_limit: usize,
}

impl DataVolumesReadyProber {
    /// Create a prober reporting up to `event_limit` events per PVC
    pub fn new(client: Arc<dyn MonitorClient>, event_limit: usize) -> Self {
        Self {
            client,
            event_limit,
        }
    }
}

#[async_trait]
impl Prober<Condition> for DataVolumesReadyProber {
    fn name(&self) -> &'static str {
        "data-volumes-ready"
    }

    async fn probe(&self, ctx: &ProbeContext, etcd: &Etcd) -> Vec<Condition> {
        let now = ctx.now();
        let namespace = etcd.namespace().unwrap_or_default();
        let sts_name = etcd.statefulset_name();

        let (status, reason, message) = match ctx
            .fetch(
                &format!("get statefulset {sts_name}"),
                self.client.get_statefulset(&namespace, &sts_name),
            )
            .await
        {
            Ok(Some(sts)) => {
                match fetch_pvc_warning_messages(
                    self.client.as_ref(),
                    ctx,
                    &namespace,
                    &sts,
                    self.event_limit,
                )
                .await
                {
                    Ok(warnings) if warnings.is_empty() => (
                        ConditionStatus::True,
                        REASON_NO_WARNINGS_FOUND_FOR_PVCS,
                        format!("No warning events found for PVCs used by StatefulSet {sts_name}"),
                    ),
                    Ok(warnings) => (
                        ConditionStatus::False,
                        REASON_WARNINGS_FOUND_FOR_PVCS,
                        warnings,
                    ),
                    Err(e) => {
                        warn!(etcd = %etcd.name_any(), error = %e, "Failed to fetch PVC warning events");
                        (
                            ConditionStatus::Unknown,
                            REASON_ERROR_FETCHING_PVC_EVENTS,
                            format!(
                                "Error fetching PVC warning events for StatefulSet {sts_name}: {e}"
                            ),
                        )
                    }
                }
            }
            Ok(None) => statefulset_not_found(&sts_name),
            Err(e) if e.is_not_found() => statefulset_not_found(&sts_name),
            Err(e) => {
                warn!(etcd = %etcd.name_any(), error = %e, "Failed to get StatefulSet");
                (
                    ConditionStatus::Unknown,
                    REASON_ERROR_FETCHING_STATEFULSET,
                    format!("Error fetching StatefulSet {sts_name}: {e}"),
                )
            }
        };

        let candidate = Condition::new(ConditionType::DataVolumesReady, status, reason, message, now);
        vec![track(etcd, candidate, now)]
    }
}

fn statefulset_not_found(sts_name: &str) -> (ConditionStatus, &'static str, String) {
    (
        ConditionStatus::Unknown,
        REASON_STATEFULSET_NOT_FOUND,
        format!("StatefulSet {sts_name} not found"),
    )
}

/// Collect warning events for the bound PVCs of a StatefulSet
///
/// PVCs belong to the StatefulSet when their name starts with
/// `<volumeClaimTemplate>-<statefulset>`. For each one the `limit` most
/// recent Warning events are rendered as
/// `"Warning for PVC <pvc>:\n-> <reason>: <message>"`, and PVC blocks are
/// joined by `"; "`. A `limit` of zero is treated as one. Returns an empty
/// string only when there are no warnings.
pub async fn fetch_pvc_warning_messages(
    client: &dyn MonitorClient,
    ctx: &ProbeContext,
    namespace: &str,
    sts: &StatefulSet,
    limit: usize,
) -> Result<String, Error> {
    let sts_name = sts.name_any();
    let prefixes: Vec<String> = sts
        .spec
        .as_ref()
        .and_then(|s| s.volume_claim_templates.as_ref())
        .map(|templates| {
            templates
                .iter()
                .map(|t| format!("{}-{sts_name}", t.name_any()))
                .collect()
        })
        .unwrap_or_default();
    if prefixes.is_empty() {
        return Ok(String::new());
    }

    let pvcs = ctx
        .fetch(
            &format!("list pvcs in {namespace}"),
            client.list_pvcs(namespace),
        )
        .await?;

    let mut blocks = Vec::new();
    for pvc in pvcs.iter().filter(|p| is_bound(p)) {
        let pvc_name = pvc.name_any();
        if !prefixes.iter().any(|prefix| pvc_name.starts_with(prefix)) {
            continue;
        }

        let events = ctx
            .fetch(
                &format!("list events for pvc {pvc_name}"),
                client.list_warning_events(namespace, &pvc_name),
            )
            .await?;
        let rendered = render_events(events, limit);
        if !rendered.is_empty() {
            blocks.push(format!("Warning for PVC {pvc_name}:\n{rendered}"));
        }
    }

    Ok(blocks.join("; "))
}

fn is_bound(pvc: &PersistentVolumeClaim) -> bool {
    pvc.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == PVC_PHASE_BOUND)
}

/// Most recent time an event was seen
fn event_time(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.first_timestamp.as_ref().map(|t| t.0))
}

/// Render the `limit` most recent events, newest first
///
/// At least one event is rendered whenever there are any, so a PVC with
/// warnings always yields a non-empty message.
fn render_events(mut events: Vec<Event>, limit: usize) -> String {
    events.sort_by_key(|e| std::cmp::Reverse(event_time(e)));
    events
        .iter()
        .take(limit.max(1))
        .map(|e| {
            format!(
                "-> {}: {}",
                e.reason.as_deref().unwrap_or_default(),
                e.message.as_deref().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
