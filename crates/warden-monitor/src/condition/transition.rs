//! Transition tracking
//!
//! A condition's `lastTransitionTime` records when its (status, reason) pair
//! last changed. Every probe funnels its candidate through
//! [`derive_transition`] so that polls which observe the same state keep the
//! original timestamp.

use chrono::{DateTime, Utc};

use warden_common::crd::{Condition, Etcd};

use super::get_condition_by_type;

/// Transition time for an observation of `(status, reason)` at `now`
///
/// `previous` is the last recorded `(status, reason, lastTransitionTime)`.
/// The recorded time is kept only when both status and reason are unchanged.
pub(crate) fn transition_time<S: PartialEq>(
    previous: Option<(&S, &str, DateTime<Utc>)>,
    status: &S,
    reason: &str,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match previous {
        Some((prev_status, prev_reason, since)) if prev_status == status && prev_reason == reason => {
            since
        }
        _ => now,
    }
}

/// Stamp a freshly computed condition with its timestamps
///
/// `last_update_time` is always `now`. `last_transition_time` is carried
/// forward from `existing` when status and reason are unchanged, and is
/// `now` otherwise (including when there is no existing condition).
pub fn derive_transition(
    existing: Option<&Condition>,
    mut candidate: Condition,
    now: DateTime<Utc>,
) -> Condition {
    candidate.last_update_time = now;
    candidate.last_transition_time = transition_time(
        existing.map(|e| (&e.status, e.reason.as_str(), e.last_transition_time)),
        &candidate.status,
        &candidate.reason,
        now,
    );
    candidate
}

/// [`derive_transition`] against the condition of the same type recorded on `etcd`
pub fn track(etcd: &Etcd, candidate: Condition, now: DateTime<Utc>) -> Condition {
    let existing = get_condition_by_type(etcd, candidate.type_);
    derive_transition(existing, candidate, now)
}
