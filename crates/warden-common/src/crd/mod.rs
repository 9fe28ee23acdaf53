//! Custom Resource Definitions and status types

mod etcd;
mod types;

pub use etcd::{
    BackupSpec, Etcd, EtcdSpec, EtcdStatus, StorageProvider, StoreSpec,
    DELTA_SNAPSHOT_LEASE_SUFFIX, FULL_SNAPSHOT_LEASE_SUFFIX,
};
pub use types::{
    Condition, ConditionStatus, ConditionType, EtcdMemberStatus, EtcdRole, MemberStatus,
};
