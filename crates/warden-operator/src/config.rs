//! Operator configuration from command-line flags and `WARDEN_*` environment variables

use std::time::Duration;

use clap::Args;

use warden_common::telemetry::LogFormat;
use warden_monitor::config::{
    DEFAULT_DELTA_SNAPSHOT_STALENESS, DEFAULT_FULL_SNAPSHOT_STALENESS,
    DEFAULT_MEMBER_NOT_READY_THRESHOLD, DEFAULT_MEMBER_UNKNOWN_THRESHOLD,
    DEFAULT_PVC_WARNING_EVENT_LIMIT,
};
use warden_monitor::{ProbeConfig, DEFAULT_FETCH_TIMEOUT};

/// Default interval between two probe passes of the same Etcd (seconds)
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;

/// Runtime configuration of the status controller
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Seconds between probe passes of the same Etcd
    #[arg(long, env = "WARDEN_PROBE_INTERVAL_SECS", default_value_t = DEFAULT_PROBE_INTERVAL_SECS)]
    pub probe_interval_secs: u64,

    /// Deadline for a single Kubernetes read, in seconds
    #[arg(long, env = "WARDEN_FETCH_TIMEOUT_SECS", default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs())]
    pub fetch_timeout_secs: u64,

    /// Age in seconds after which the last full snapshot is stale
    #[arg(
        long,
        env = "WARDEN_FULL_SNAPSHOT_STALENESS_SECS",
        default_value_t = DEFAULT_FULL_SNAPSHOT_STALENESS.as_secs()
    )]
    pub full_snapshot_staleness_secs: u64,

    /// Age in seconds after which the last delta snapshot is stale
    #[arg(
        long,
        env = "WARDEN_DELTA_SNAPSHOT_STALENESS_SECS",
        default_value_t = DEFAULT_DELTA_SNAPSHOT_STALENESS.as_secs()
    )]
    pub delta_snapshot_staleness_secs: u64,

    /// Seconds without a member lease renewal before the member is Unknown
    #[arg(
        long,
        env = "WARDEN_MEMBER_UNKNOWN_THRESHOLD_SECS",
        default_value_t = DEFAULT_MEMBER_UNKNOWN_THRESHOLD.as_secs()
    )]
    pub member_unknown_threshold_secs: u64,

    /// Further seconds before an Unknown member is declared NotReady
    #[arg(
        long,
        env = "WARDEN_MEMBER_NOT_READY_THRESHOLD_SECS",
        default_value_t = DEFAULT_MEMBER_NOT_READY_THRESHOLD.as_secs()
    )]
    pub member_not_ready_threshold_secs: u64,

    /// Most recent warning events reported per PVC
    #[arg(
        long,
        env = "WARDEN_PVC_WARNING_EVENT_LIMIT",
        default_value_t = DEFAULT_PVC_WARNING_EVENT_LIMIT,
        value_parser = parse_event_limit
    )]
    pub pvc_warning_event_limit: usize,

    /// Only watch Etcd objects in this namespace (all namespaces if unset)
    #[arg(long, env = "WARDEN_NAMESPACE")]
    pub namespace: Option<String>,

    /// Log output format: json or text
    #[arg(long, env = "WARDEN_LOG_FORMAT", default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

/// Parse the per-PVC event limit, which must be at least one
fn parse_event_limit(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(limit) => Ok(limit),
        Err(e) => Err(format!("invalid event limit '{s}': {e}")),
    }
}

impl OperatorConfig {
    /// Interval between probe passes of the same Etcd
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    /// Deadline for a single Kubernetes read
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Thresholds handed to the probes
    pub fn to_probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            full_snapshot_staleness: Duration::from_secs(self.full_snapshot_staleness_secs),
            delta_snapshot_staleness: Duration::from_secs(self.delta_snapshot_staleness_secs),
            member_unknown_threshold: Duration::from_secs(self.member_unknown_threshold_secs),
            member_not_ready_threshold: Duration::from_secs(self.member_not_ready_threshold_secs),
            pvc_warning_event_limit: self.pvc_warning_event_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: OperatorConfig,
    }

    fn parse(args: &[&str]) -> OperatorConfig {
        let argv = std::iter::once("warden-operator").chain(args.iter().copied());
        TestCli::try_parse_from(argv)
            .expect("arguments should parse")
            .config
    }

    #[test]
    fn test_defaults_match_probe_defaults() {
        let config = parse(&[]);
        assert_eq!(config.probe_interval(), Duration::from_secs(30));
        assert_eq!(config.fetch_timeout(), DEFAULT_FETCH_TIMEOUT);
        assert_eq!(config.to_probe_config(), ProbeConfig::default());
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_flags_override_thresholds() {
        let config = parse(&[
            "--full-snapshot-staleness-secs",
            "7200",
            "--delta-snapshot-staleness-secs",
            "120",
            "--pvc-warning-event-limit",
            "5",
            "--namespace",
            "etcd-system",
            "--log-format",
            "text",
        ]);

        let probe = config.to_probe_config();
        assert_eq!(probe.full_snapshot_staleness, Duration::from_secs(7200));
        assert_eq!(probe.delta_snapshot_staleness, Duration::from_secs(120));
        assert_eq!(probe.pvc_warning_event_limit, 5);
        assert_eq!(config.namespace.as_deref(), Some("etcd-system"));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_zero_event_limit_is_rejected() {
        let argv = ["warden-operator", "--pvc-warning-event-limit", "0"];
        assert!(TestCli::try_parse_from(argv).is_err());
        assert_eq!(parse(&["--pvc-warning-event-limit", "1"]).pvc_warning_event_limit, 1);
    }

    #[test]
    fn test_invalid_log_format_is_rejected() {
        let argv = ["warden-operator", "--log-format", "xml"];
        assert!(TestCli::try_parse_from(argv).is_err());
    }
}
