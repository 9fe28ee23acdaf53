//! Worst-of aggregation shared by the BackupReady and Ready composers

use chrono::{DateTime, Utc};

use warden_common::crd::{Condition, ConditionStatus, ConditionType};

/// Severity of a status for worst-of aggregation (higher is worse)
///
/// An undetermined status outranks a determined bad one, so ambiguity is
/// never hidden behind a False or True aggregate.
pub fn severity(status: ConditionStatus) -> u8 {
    match status {
        ConditionStatus::True => 0,
        ConditionStatus::Progressing => 1,
        ConditionStatus::False => 2,
        ConditionStatus::ConditionCheckError => 3,
        ConditionStatus::Unknown => 4,
    }
}

/// The most severe of the given statuses, `None` if there are none
pub fn worst_of(statuses: impl IntoIterator<Item = ConditionStatus>) -> Option<ConditionStatus> {
    statuses.into_iter().max_by_key(|s| severity(*s))
}

/// Reasons reported by an aggregate condition
#[derive(Clone, Copy, Debug)]
pub struct AggregateReasons {
    /// Every constituent is True
    pub healthy: &'static str,
    /// The worst constituent is False or Progressing
    pub degraded: &'static str,
    /// The worst constituent could not be determined
    pub unknown: &'static str,
}

impl AggregateReasons {
    fn for_status(&self, status: ConditionStatus) -> &'static str {
        match status {
            ConditionStatus::True => self.healthy,
            ConditionStatus::False | ConditionStatus::Progressing => self.degraded,
            ConditionStatus::Unknown | ConditionStatus::ConditionCheckError => self.unknown,
        }
    }
}

/// Combine constituent conditions into an aggregate candidate
///
/// The aggregate status is the worst constituent status. When anything is
/// not True the message lists each such constituent with its status,
/// reason and message. An empty constituent list aggregates to Unknown.
/// The result still has to go through transition tracking.
pub fn aggregate(
    type_: ConditionType,
    constituents: &[&Condition],
    reasons: &AggregateReasons,
    healthy_message: &str,
    now: DateTime<Utc>,
) -> Condition {
    let status =
        worst_of(constituents.iter().map(|c| c.status)).unwrap_or(ConditionStatus::Unknown);

    let message = if status == ConditionStatus::True {
        healthy_message.to_string()
    } else if constituents.is_empty() {
        format!("No constituent conditions to derive {type_} from")
    } else {
        constituents
            .iter()
            .filter(|c| c.status != ConditionStatus::True)
            .map(|c| format!("{} is {} ({}): {}", c.type_, c.status, c.reason, c.message))
            .collect::<Vec<_>>()
            .join("; ")
    };

    Condition::new(type_, status, reasons.for_status(status), message, now)
}
