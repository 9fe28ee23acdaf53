//! Probe thresholds

use std::time::Duration;

/// Default staleness threshold for full snapshots (24h schedule plus 1h grace)
pub const DEFAULT_FULL_SNAPSHOT_STALENESS: Duration = Duration::from_secs(25 * 60 * 60);

/// Default staleness threshold for delta snapshots
pub const DEFAULT_DELTA_SNAPSHOT_STALENESS: Duration = Duration::from_secs(10 * 60);

/// Default time after which an unrenewed member lease makes the member Unknown
pub const DEFAULT_MEMBER_UNKNOWN_THRESHOLD: Duration = Duration::from_secs(60);

/// Default additional time after which an Unknown member becomes NotReady
pub const DEFAULT_MEMBER_NOT_READY_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// Default number of most recent warning events reported per PVC
pub const DEFAULT_PVC_WARNING_EVENT_LIMIT: usize = 2;

/// Thresholds used to classify the evidence gathered by the probes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Maximum age of the last full snapshot before it is considered stale
    pub full_snapshot_staleness: Duration,

    /// Maximum age of the last delta snapshot before it is considered stale
    pub delta_snapshot_staleness: Duration,

    /// Lease age beyond which a member's state is unknown
    pub member_unknown_threshold: Duration,

    /// Additional lease age beyond which a member is declared not ready
    pub member_not_ready_threshold: Duration,

    /// Number of most recent warning events reported per PVC
    pub pvc_warning_event_limit: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            full_snapshot_staleness: DEFAULT_FULL_SNAPSHOT_STALENESS,
            delta_snapshot_staleness: DEFAULT_DELTA_SNAPSHOT_STALENESS,
            member_unknown_threshold: DEFAULT_MEMBER_UNKNOWN_THRESHOLD,
            member_not_ready_threshold: DEFAULT_MEMBER_NOT_READY_THRESHOLD,
            pvc_warning_event_limit: DEFAULT_PVC_WARNING_EVENT_LIMIT,
        }
    }
}
