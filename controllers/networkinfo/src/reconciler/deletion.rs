//! VPC teardown for deleted NetworkInfo objects

use super::Reconciler;
use crate::error::{AggregateError, ControllerError};
use crate::events::{actions, reasons};
use crate::metrics::{RESULT_DELETE_FAILURE, RESULT_DELETE_SUCCESS};
use crds::NetworkInfo;
use kube::Resource;
use kube_runtime::controller::Action;
use kube_runtime::events::EventType;
use nsx_client::Vpc;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Result of deleting a batch of VPCs
#[derive(Debug, Default)]
pub(crate) struct DeleteOutcome {
    /// Display names of the VPCs that are gone
    pub deleted: HashSet<String>,
    pub errors: AggregateError,
}

impl Reconciler {
    /// Delete the namespace's VPCs that no live namespace claims any more.
    ///
    /// Used when the NetworkInfo no longer exists.
    pub(crate) async fn delete_vpcs_by_namespace(&self, namespace: &str) -> Result<Action, ControllerError> {
        let result = self.collect_namespace_orphans(namespace).await;
        let vpcs = match result {
            Ok(vpcs) => vpcs,
            Err(e) => {
                self.metrics.record_reconcile(RESULT_DELETE_FAILURE);
                return Err(e);
            }
        };
        self.finish_deletion(namespace, vpcs, None).await
    }

    /// Deletion pass for a NetworkInfo the watch reported as deleted.
    ///
    /// Returns `false` without touching NSX when the object exists again;
    /// the controller owns it from then on.
    pub(crate) async fn reconcile_deleted_network_info(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, ControllerError> {
        if self.cluster.get_network_info(namespace, name).await?.is_some() {
            debug!("NetworkInfo {}/{} exists again, skipping deletion", namespace, name);
            return Ok(false);
        }
        self.delete_vpcs_by_namespace(namespace).await?;
        Ok(true)
    }

    /// Delete the VPCs created for this NetworkInfo object.
    ///
    /// Matches on the CR UID tag; a namespace can host VPCs owned by other
    /// objects.
    pub(crate) async fn delete_vpcs_by_network_info(&self, network_info: &NetworkInfo) -> Result<Action, ControllerError> {
        let namespace = network_info.metadata.namespace.as_deref().unwrap_or_default();
        let uid = network_info.metadata.uid.as_deref().unwrap_or_default();
        let vpcs: Vec<Vpc> = self
            .gateway
            .get_vpcs_by_namespace(namespace)
            .into_iter()
            .filter(|vpc| vpc.cr_uid() == Some(uid))
            .collect();
        self.finish_deletion(namespace, vpcs, Some(network_info)).await
    }

    async fn collect_namespace_orphans(&self, namespace: &str) -> Result<Vec<Vpc>, ControllerError> {
        if self.gateway.is_shared_vpc_namespace_by_ns(namespace).await? {
            debug!("Namespace {} shares another namespace's VPC, nothing to delete", namespace);
            return Ok(Vec::new());
        }
        let vpcs = self.gateway.get_vpcs_by_namespace(namespace);
        if vpcs.is_empty() {
            return Ok(vpcs);
        }
        let live_uids = self.live_namespace_uids().await?;
        Ok(vpcs
            .into_iter()
            .filter(|vpc| vpc.namespace_uid().is_some_and(|uid| !live_uids.contains(uid)))
            .collect())
    }

    /// UIDs of every Namespace currently in the cluster
    pub(crate) async fn live_namespace_uids(&self) -> Result<HashSet<String>, ControllerError> {
        Ok(self
            .cluster
            .list_namespaces()
            .await?
            .into_iter()
            .filter_map(|ns| ns.metadata.uid)
            .collect())
    }

    /// Attempt every deletion, collecting failures instead of stopping at the first
    pub(crate) async fn delete_each(&self, vpcs: &[Vpc]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        for vpc in vpcs {
            match self.gateway.delete_vpc(&vpc.path).await {
                Ok(()) => {
                    info!(vpc = %vpc.path, "Deleted VPC");
                    outcome.deleted.insert(vpc.display_name.clone());
                }
                Err(e) => {
                    warn!(vpc = %vpc.path, "Failed to delete VPC: {}", e);
                    outcome.errors.push(format!("{}: {}", vpc.path, e));
                }
            }
        }
        outcome
    }

    async fn finish_deletion(
        &self,
        namespace: &str,
        vpcs: Vec<Vpc>,
        network_info: Option<&NetworkInfo>,
    ) -> Result<Action, ControllerError> {
        let DeleteOutcome { deleted, mut errors } = self.delete_each(&vpcs).await;
        if let Err(e) = self.status.remove_config_vpc_infos(&deleted).await {
            errors.push(format!("VPCNetworkConfiguration status cleanup: {}", e));
        }

        let result = errors.into_result();
        let (metric, event_type, reason, note) = match &result {
            Ok(()) => {
                info!(namespace, "Deleted {} VPC(s)", deleted.len());
                (
                    RESULT_DELETE_SUCCESS,
                    EventType::Normal,
                    reasons::VPC_DELETED,
                    format!("Deleted {} VPC(s)", deleted.len()),
                )
            }
            Err(e) => (
                RESULT_DELETE_FAILURE,
                EventType::Warning,
                reasons::VPC_DELETE_FAILED,
                e.to_string(),
            ),
        };
        self.metrics.record_reconcile(metric);
        if let Some(ni) = network_info {
            self.events
                .publish(&ni.object_ref(&()), event_type, reason, actions::DELETE, Some(note))
                .await;
        }
        result.map(|()| Action::await_change())
    }
}

#[cfg(test)]
#[path = "deletion_test.rs"]
mod deletion_test;
