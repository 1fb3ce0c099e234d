//! NetworkInfo Controller
//!
//! Provisions one NSX VPC per Kubernetes namespace:
//! - NetworkInfo: per-namespace VPC state (SNAT IP, LB CIDR, private IPs)
//! - VPCNetworkConfiguration: the NSX project, profile and IP ranges a namespace uses
//! - Namespace: readiness condition for consumers of the namespace network
//!
//! Orphan VPCs are garbage collected and pre-created VPCs are polled for drift.

mod cluster;
mod conditions;
mod config;
mod controller;
mod error;
mod events;
mod metrics;
mod reconciler;
mod registry;
mod requeue;
mod status;
mod watcher;

#[cfg(test)]
mod test_utils;

use config::ControllerConfig;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // kube and reqwest both link rustls; pick the ring provider explicitly
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting NetworkInfo Controller");

    let config = ControllerConfig::from_env()?;
    info!("Configuration:");
    info!("  NSX manager: {}", config.nsx_url);
    info!("  Cluster: {}", config.cluster_name);
    info!("  Load balancer provider: {}", config.lb_provider);
    info!(
        "  Namespace: {}",
        config.watch_namespace.as_deref().unwrap_or("all namespaces")
    );

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
