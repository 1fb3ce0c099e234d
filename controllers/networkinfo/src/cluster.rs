//! Kubernetes object surface used by the reconciler.
//!
//! The trait keeps reconciliation testable without an API server; 404s are
//! returned as `None` so callers can treat "already deleted" and "not yet
//! created" as ordinary states.

use crate::error::{ControllerError, is_not_found};
use crds::{NetworkInfo, NetworkInfoStatus, VPCNetworkConfiguration, VPCNetworkConfigurationStatus, VPCState};
use k8s_openapi::api::core::v1::{Namespace, NamespaceCondition};
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

/// Kubernetes reads and writes performed by the controller
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    async fn get_network_info(&self, namespace: &str, name: &str) -> Result<Option<NetworkInfo>, ControllerError>;

    /// NetworkInfos in `namespace`, or in every namespace
    async fn list_network_infos(&self, namespace: Option<&str>) -> Result<Vec<NetworkInfo>, ControllerError>;

    /// Replace the observed VPC list (main resource)
    async fn update_network_info_vpcs(&self, namespace: &str, name: &str, vpcs: &[VPCState]) -> Result<(), ControllerError>;

    async fn update_network_info_status(&self, namespace: &str, name: &str, status: &NetworkInfoStatus) -> Result<(), ControllerError>;

    async fn get_vpc_network_configuration(&self, name: &str) -> Result<Option<VPCNetworkConfiguration>, ControllerError>;

    async fn list_vpc_network_configurations(&self) -> Result<Vec<VPCNetworkConfiguration>, ControllerError>;

    async fn update_vpc_network_configuration_status(&self, name: &str, status: &VPCNetworkConfigurationStatus) -> Result<(), ControllerError>;

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ControllerError>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ControllerError>;

    async fn update_namespace_conditions(&self, name: &str, conditions: &[NamespaceCondition]) -> Result<(), ControllerError>;
}

/// `ClusterClientTrait` over the Kubernetes API
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

/// Map a 404 to `None`
fn optional<T>(result: Result<T, kube::Error>) -> Result<Option<T>, ControllerError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn get_network_info(&self, namespace: &str, name: &str) -> Result<Option<NetworkInfo>, ControllerError> {
        let api: Api<NetworkInfo> = Api::namespaced(self.client.clone(), namespace);
        optional(api.get(name).await)
    }

    async fn list_network_infos(&self, namespace: Option<&str>) -> Result<Vec<NetworkInfo>, ControllerError> {
        let api: Api<NetworkInfo> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn update_network_info_vpcs(&self, namespace: &str, name: &str, vpcs: &[VPCState]) -> Result<(), ControllerError> {
        let api: Api<NetworkInfo> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "spec": { "vpcs": vpcs } });
        match api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("NetworkInfo {}/{} disappeared before VPC state update", namespace, name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_network_info_status(&self, namespace: &str, name: &str, status: &NetworkInfoStatus) -> Result<(), ControllerError> {
        let api: Api<NetworkInfo> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "status": status });
        match api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch)).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_vpc_network_configuration(&self, name: &str) -> Result<Option<VPCNetworkConfiguration>, ControllerError> {
        let api: Api<VPCNetworkConfiguration> = Api::all(self.client.clone());
        optional(api.get(name).await)
    }

    async fn list_vpc_network_configurations(&self) -> Result<Vec<VPCNetworkConfiguration>, ControllerError> {
        let api: Api<VPCNetworkConfiguration> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn update_vpc_network_configuration_status(&self, name: &str, status: &VPCNetworkConfigurationStatus) -> Result<(), ControllerError> {
        let api: Api<VPCNetworkConfiguration> = Api::all(self.client.clone());
        // Merge patch replaces both lists wholesale
        let patch = json!({ "status": status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ControllerError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        optional(api.get(name).await)
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ControllerError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn update_namespace_conditions(&self, name: &str, conditions: &[NamespaceCondition]) -> Result<(), ControllerError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let patch = json!({ "status": { "conditions": conditions } });
        match api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch)).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
