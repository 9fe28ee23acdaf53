//! Common types for etcd-warden: the Etcd CRD, health conditions, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod telemetry;

pub use error::{Error, ReconcileError};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used when writing Etcd status
pub const STATUS_FIELD_MANAGER: &str = "warden-monitor";

/// Requeue interval after a failed reconcile (seconds)
pub const REQUEUE_ERROR_SECS: u64 = 60;
