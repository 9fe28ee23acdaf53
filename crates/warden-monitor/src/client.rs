//! Read-only Kubernetes access used by the probes
//!
//! Every lookup distinguishes absence (`Ok(None)`) from failure (`Err`), so
//! probes can tell a resource that was never created from an API outage.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::{Event, PersistentVolumeClaim, Pod};
use kube::api::{Api, ListParams};
use kube::Client;
use serde::de::DeserializeOwned;

#[cfg(test)]
use mockall::automock;

use warden_common::Error;

/// Trait abstracting the Kubernetes reads performed by the probes
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MonitorClient: Send + Sync {
    /// Get a Lease by name, `None` if it does not exist
    async fn get_lease(&self, namespace: &str, name: &str) -> Result<Option<Lease>, Error>;

    /// Get a StatefulSet by name, `None` if it does not exist
    async fn get_statefulset(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, Error>;

    /// Get a Pod by name, `None` if it does not exist
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, Error>;

    /// List all PersistentVolumeClaims in a namespace
    async fn list_pvcs(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>, Error>;

    /// List Warning events whose involved object is the named PVC
    async fn list_warning_events(
        &self,
        namespace: &str,
        pvc_name: &str,
    ) -> Result<Vec<Event>, Error>;
}

/// Real Kubernetes client implementation
pub struct KubeMonitorClient {
    client: Client,
}

impl KubeMonitorClient {
    /// Create a new KubeMonitorClient wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_opt<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, Error>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + std::fmt::Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MonitorClient for KubeMonitorClient {
    async fn get_lease(&self, namespace: &str, name: &str) -> Result<Option<Lease>, Error> {
        self.get_opt(namespace, name).await
    }

    async fn get_statefulset(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, Error> {
        self.get_opt(namespace, name).await
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, Error> {
        self.get_opt(namespace, name).await
    }

    async fn list_pvcs(&self, namespace: &str) -> Result<Vec<PersistentVolumeClaim>, Error> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_warning_events(
        &self,
        namespace: &str,
        pvc_name: &str,
    ) -> Result<Vec<Event>, Error> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().fields(&warning_event_selector(pvc_name));
        Ok(api.list(&params).await?.items)
    }
}

/// Field selector matching Warning events on the named PVC
pub fn warning_event_selector(pvc_name: &str) -> String {
    format!(
        "involvedObject.kind=PersistentVolumeClaim,involvedObject.name={pvc_name},type=Warning"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_event_selector() {
        assert_eq!(
            warning_event_selector("etcd-main-etcd-main-0"),
            "involvedObject.kind=PersistentVolumeClaim,involvedObject.name=etcd-main-etcd-main-0,type=Warning"
        );
    }
}
