//! Health condition derivation for etcd clusters
//!
//! The [`Monitor`] runs a fixed set of read-only probes against an Etcd and
//! returns fresh health conditions and member statuses. It never writes:
//! persisting the result is the caller's job.
//!
//! - Probes never fail; fetch errors become Unknown conditions
//! - `lastTransitionTime` only moves when status or reason changes
//! - Ready is the worst of AllMembersReady, BackupReady and DataVolumesReady

#![deny(missing_docs)]

pub mod client;
pub mod condition;
pub mod config;
pub mod member;
pub mod prober;

pub use client::{KubeMonitorClient, MonitorClient};
pub use condition::{derive_transition, get_condition_by_type};
pub use config::ProbeConfig;
pub use prober::{Monitor, ProbeContext, Prober, DEFAULT_FETCH_TIMEOUT};
