//! Pre-created VPC drift detection.
//!
//! Pre-created VPCs are never written by the controller, so changes made
//! to them in NSX are only noticed by polling.

use super::Reconciler;
use crate::error::ControllerError;
use crate::status::same_ip_set;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

impl Reconciler {
    /// Compare every pre-created VPC with the state recorded on its
    /// namespace's NetworkInfo objects and re-enqueue those that differ.
    ///
    /// Returns the number of NetworkInfo objects enqueued.
    pub async fn check_pre_created_vpc_drift(&self) -> Result<usize, ControllerError> {
        let pre_created = self.registry.get_namespaces_with_pre_created_vpcs();
        if pre_created.is_empty() {
            debug!("No namespaces use pre-created VPCs, skipping drift check");
            return Ok(0);
        }
        let live_vpcs = self.gateway.get_all_vpcs_from_nsx().await?;

        let mut enqueued = 0;
        for (namespace, vpc_path) in &pre_created {
            let network_infos = match self.cluster.list_network_infos(Some(namespace)).await {
                Ok(list) => list,
                Err(e) => {
                    warn!(namespace = %namespace, "Failed to list NetworkInfos for drift check: {}", e);
                    continue;
                }
            };
            for ni in &network_infos {
                let Some(name) = ni.metadata.name.as_deref() else {
                    continue;
                };
                let drifted = match live_vpcs.get(vpc_path) {
                    None => {
                        info!(namespace = %namespace, vpc = %vpc_path, "Pre-created VPC no longer exists in NSX");
                        true
                    }
                    Some(vpc) => {
                        let recorded = ni
                            .spec
                            .vpcs
                            .first()
                            .map(|s| s.private_ips.as_slice())
                            .unwrap_or_default();
                        let changed = !same_ip_set(recorded, &vpc.private_ips);
                        if changed {
                            info!(
                                namespace = %namespace,
                                vpc = %vpc_path,
                                "Private IPs changed from {:?} to {:?}",
                                recorded, vpc.private_ips
                            );
                        }
                        changed
                    }
                };
                if drifted && self.queue.enqueue(namespace, name) {
                    self.metrics.drift_requeues_total.inc();
                    enqueued += 1;
                }
            }
        }
        Ok(enqueued)
    }

    /// Run `check_pre_created_vpc_drift` every `period` until the task is dropped
    pub async fn run_drift_loop(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.check_pre_created_vpc_drift().await {
                Ok(0) => {}
                Ok(count) => info!("Drift check re-enqueued {} NetworkInfo(s)", count),
                Err(e) => error!("Drift check aborted: {}", e),
            }
        }
    }
}

#[cfg(test)]
#[path = "drift_test.rs"]
mod drift_test;
