//! Status controller for etcd-warden
//!
//! Watches Etcd objects, runs the health probes from `warden-monitor` on a
//! fixed interval and writes the resulting conditions to `.status`.

#![deny(missing_docs)]

pub mod config;
pub mod controller;

pub use config::OperatorConfig;
pub use controller::{error_policy, reconcile, Context};
