//! Kubernetes Events announcing condition transitions
//!
//! Each status change of an Etcd health condition becomes one Event on the
//! Etcd, with the condition type as its reason. `kubectl describe etcd`
//! then shows when a cluster went from Ready to degraded and why.
//!
//! Publishing never fails the caller. The status write has already
//! happened by the time an Event is sent.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

use crate::crd::{Condition, ConditionStatus};

/// Sink for Events about an Etcd
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one Event on `resource_ref`; failures are only logged
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );

    /// Announce that `condition` moved away from `previous`
    ///
    /// `previous` is `None` when the condition is recorded for the first
    /// time. The Event is a Warning unless the new status is healthy.
    async fn publish_transition(
        &self,
        resource_ref: &ObjectReference,
        previous: Option<ConditionStatus>,
        condition: &Condition,
    ) {
        self.publish(
            resource_ref,
            event_type_for(condition),
            &condition.type_.to_string(),
            actions::PROBE,
            Some(transition_note(previous, condition)),
        )
        .await;
    }
}

/// Publishes through a `kube` event [`Recorder`]
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Publisher reporting as `controller_name`, with the pod name (from
    /// `POD_NAME`) as the reporting instance when it is set
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                object = resource_ref.name.as_deref().unwrap_or_default(),
                reason,
                error = %e,
                "Failed to publish condition transition event"
            );
        }
    }
}

/// Event type for a condition that just transitioned
///
/// Anything short of a healthy or progressing condition is a Warning.
pub fn event_type_for(condition: &Condition) -> EventType {
    match condition.status {
        ConditionStatus::True | ConditionStatus::Progressing => EventType::Normal,
        ConditionStatus::False | ConditionStatus::Unknown | ConditionStatus::ConditionCheckError => {
            EventType::Warning
        }
    }
}

/// Human-readable note for a condition transition event
pub fn transition_note(previous: Option<ConditionStatus>, condition: &Condition) -> String {
    match previous {
        Some(previous) => format!(
            "{} changed from {} to {} ({}): {}",
            condition.type_, previous, condition.status, condition.reason, condition.message
        ),
        None => format!(
            "{} is {} ({}): {}",
            condition.type_, condition.status, condition.reason, condition.message
        ),
    }
}

/// Event actions, shown in the ACTION column of `kubectl get events`
pub mod actions {
    /// Periodic health probe of an Etcd
    pub const PROBE: &str = "Probe";
}
