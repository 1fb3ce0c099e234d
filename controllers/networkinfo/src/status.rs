//! Status projection onto NetworkInfo, VPCNetworkConfiguration and Namespace.
//!
//! Every write is read-merge-write and skipped when the merge changed
//! nothing, so a retry loop never produces no-op API writes.
//! VPCNetworkConfiguration status is shared by every namespace using the
//! configuration; concurrent writers may clobber each other and converge on
//! the next pass.

use crate::cluster::ClusterClientTrait;
use crate::conditions::merge_condition;
use crate::error::ControllerError;
use crds::{Condition, NetworkInfo, VPCInfo, VPCState};
use k8s_openapi::api::core::v1::NamespaceCondition;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Order-insensitive comparison of private IP lists
pub fn same_ip_set(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

/// VPC states equal up to private IP ordering
pub fn same_vpc_state(a: &VPCState, b: &VPCState) -> bool {
    a.name == b.name
        && a.default_snat_ip == b.default_snat_ip
        && a.load_balancer_ip_addresses == b.load_balancer_ip_addresses
        && same_ip_set(&a.private_ips, &b.private_ips)
}

/// Writes status surfaces through the cluster client
#[derive(Clone)]
pub struct StatusProjector {
    cluster: Arc<dyn ClusterClientTrait>,
}

impl std::fmt::Debug for StatusProjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusProjector").finish_non_exhaustive()
    }
}

impl StatusProjector {
    pub fn new(cluster: Arc<dyn ClusterClientTrait>) -> Self {
        Self { cluster }
    }

    /// Merge a condition into the Namespace's status. Returns true if written.
    pub async fn set_namespace_condition(
        &self,
        namespace: &str,
        condition: NamespaceCondition,
    ) -> Result<bool, ControllerError> {
        let Some(ns) = self.cluster.get_namespace(namespace).await? else {
            debug!("Namespace {} not found, skipping condition update", namespace);
            return Ok(false);
        };
        let mut conditions = ns
            .status
            .and_then(|s| s.conditions)
            .unwrap_or_default();
        if !merge_condition(&mut conditions, condition) {
            return Ok(false);
        }
        self.cluster
            .update_namespace_conditions(namespace, &conditions)
            .await?;
        Ok(true)
    }

    /// Record the namespace's VPC state on the NetworkInfo.
    ///
    /// One VPC per namespace: the list is replaced by `state`, and nothing is
    /// written when the recorded state already matches.
    pub async fn update_network_info_state(
        &self,
        network_info: &NetworkInfo,
        state: VPCState,
    ) -> Result<bool, ControllerError> {
        let recorded = &network_info.spec.vpcs;
        if recorded.len() == 1 && same_vpc_state(&recorded[0], &state) {
            return Ok(false);
        }
        let (namespace, name) = object_key(network_info)?;
        self.cluster
            .update_network_info_vpcs(namespace, name, &[state])
            .await?;
        Ok(true)
    }

    /// Merge a condition into the NetworkInfo's own status
    pub async fn set_network_info_condition(
        &self,
        network_info: &NetworkInfo,
        condition: Condition,
    ) -> Result<bool, ControllerError> {
        let mut status = network_info.status.clone().unwrap_or_default();
        if !merge_condition(&mut status.conditions, condition) {
            return Ok(false);
        }
        let (namespace, name) = object_key(network_info)?;
        self.cluster
            .update_network_info_status(namespace, name, &status)
            .await?;
        Ok(true)
    }

    /// Merge a condition into a VPCNetworkConfiguration's status
    pub async fn set_config_condition(
        &self,
        config_name: &str,
        condition: Condition,
    ) -> Result<bool, ControllerError> {
        let Some(config) = self.cluster.get_vpc_network_configuration(config_name).await? else {
            debug!("VPCNetworkConfiguration {} not found, skipping condition update", config_name);
            return Ok(false);
        };
        let mut status = config.status.unwrap_or_default();
        if !merge_condition(&mut status.conditions, condition) {
            return Ok(false);
        }
        self.cluster
            .update_vpc_network_configuration_status(config_name, &status)
            .await?;
        Ok(true)
    }

    /// Replace the VPC info with the same name, else append it
    pub async fn upsert_config_vpc_info(
        &self,
        config_name: &str,
        info: VPCInfo,
    ) -> Result<bool, ControllerError> {
        self.modify_config_vpc_infos(config_name, |vpcs| {
            match vpcs.iter_mut().find(|v| v.name == info.name) {
                Some(existing) if *existing == info => false,
                Some(existing) => {
                    *existing = info;
                    true
                }
                None => {
                    vpcs.push(info);
                    true
                }
            }
        })
        .await
    }

    /// Overwrite the first VPC info regardless of its name.
    ///
    /// Only valid while a configuration backs exactly one VPC, which holds
    /// for pre-created VPC configurations.
    pub async fn overwrite_config_single_vpc_info(
        &self,
        config_name: &str,
        info: VPCInfo,
    ) -> Result<bool, ControllerError> {
        self.modify_config_vpc_infos(config_name, |vpcs| match vpcs.first_mut() {
            Some(existing) if *existing == info => false,
            Some(existing) => {
                *existing = info;
                true
            }
            None => {
                vpcs.push(info);
                true
            }
        })
        .await
    }

    /// Remove VPC infos named in `deleted` from every configuration
    pub async fn remove_config_vpc_infos(
        &self,
        deleted: &HashSet<String>,
    ) -> Result<usize, ControllerError> {
        if deleted.is_empty() {
            return Ok(0);
        }
        let mut updated = 0;
        for config in self.cluster.list_vpc_network_configurations().await? {
            let Some(name) = config.metadata.name.as_deref() else {
                continue;
            };
            let mut status = config.status.clone().unwrap_or_default();
            let before = status.vpcs.len();
            status.vpcs.retain(|v| !deleted.contains(&v.name));
            if status.vpcs.len() != before {
                self.cluster
                    .update_vpc_network_configuration_status(name, &status)
                    .await?;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn modify_config_vpc_infos<F>(
        &self,
        config_name: &str,
        modify: F,
    ) -> Result<bool, ControllerError>
    where
        F: FnOnce(&mut Vec<VPCInfo>) -> bool + Send,
    {
        let Some(config) = self.cluster.get_vpc_network_configuration(config_name).await? else {
            debug!("VPCNetworkConfiguration {} not found, skipping VPC info update", config_name);
            return Ok(false);
        };
        let mut status = config.status.unwrap_or_default();
        if !modify(&mut status.vpcs) {
            return Ok(false);
        }
        self.cluster
            .update_vpc_network_configuration_status(config_name, &status)
            .await?;
        Ok(true)
    }
}

fn object_key(network_info: &NetworkInfo) -> Result<(&str, &str), ControllerError> {
    let namespace = network_info
        .metadata
        .namespace
        .as_deref()
        .ok_or_else(|| ControllerError::InvalidConfig("NetworkInfo missing namespace".to_string()))?;
    let name = network_info
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| ControllerError::InvalidConfig("NetworkInfo missing name".to_string()))?;
    Ok((namespace, name))
}

#[cfg(test)]
#[path = "status_test.rs"]
mod status_test;
