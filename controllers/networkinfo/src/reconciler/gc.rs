//! Orphan VPC garbage collection.
//!
//! Sweeps the operator-managed VPC store against live Namespaces and deletes
//! VPCs whose namespace UID no longer exists. Covers NetworkInfo objects
//! deleted while the controller was down. Only a failure to enumerate the
//! candidates aborts a sweep.

use super::Reconciler;
use crate::error::ControllerError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Counts from one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcReport {
    pub attempted: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl Reconciler {
    /// Run one garbage collection sweep
    pub async fn collect_garbage(&self) -> Result<GcReport, ControllerError> {
        let vpcs = self.gateway.list_vpc();
        if vpcs.is_empty() {
            return Ok(GcReport::default());
        }
        let live_uids = self.live_namespace_uids().await?;

        let orphans: Vec<_> = vpcs
            .into_iter()
            .filter(|vpc| vpc.namespace_uid().is_some_and(|uid| !live_uids.contains(uid)))
            .collect();
        if orphans.is_empty() {
            return Ok(GcReport::default());
        }
        info!("Garbage collecting {} orphan VPC(s)", orphans.len());

        let outcome = self.delete_each(&orphans).await;
        let report = GcReport {
            attempted: orphans.len(),
            deleted: outcome.deleted.len(),
            failed: outcome.errors.len(),
        };
        self.metrics
            .gc_vpcs_total
            .with_label_values(&["deleted"])
            .inc_by(report.deleted as u64);
        self.metrics
            .gc_vpcs_total
            .with_label_values(&["failed"])
            .inc_by(report.failed as u64);

        if let Err(e) = self.status.remove_config_vpc_infos(&outcome.deleted).await {
            error!("Failed to clean up VPCNetworkConfiguration status after GC: {}", e);
        }
        if !outcome.errors.is_empty() {
            error!("Garbage collection left {}", outcome.errors);
        }
        Ok(report)
    }

    /// Run `collect_garbage` every `period` until the task is dropped
    pub async fn run_gc_loop(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; startup has just synced
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.collect_garbage().await {
                Ok(report) if report.attempted > 0 => info!(
                    "Garbage collection: {} attempted, {} deleted, {} failed",
                    report.attempted, report.deleted, report.failed
                ),
                Ok(_) => {}
                Err(e) => error!("Garbage collection sweep aborted: {}", e),
            }
        }
    }
}

#[cfg(test)]
#[path = "gc_test.rs"]
mod gc_test;
