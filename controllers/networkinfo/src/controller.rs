//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the NSX gateway,
//! the Kubernetes clients and the reconciler together, loads startup state
//! and runs every background task until one of them exits or the process
//! is interrupted.

use crate::cluster::KubeClusterClient;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};
use crate::metrics::{self, Metrics, ServerState};
use crate::reconciler::{NetworkInfoQueue, Reconciler};
use crate::registry::{NetworkConfigRegistry, build_network_config_info};
use crate::watcher::Watcher;
use crds::NetworkInfo;
use kube::Client;
use kube_runtime::reflector::ObjectRef;
use nsx_client::{NsxClient, VpcService};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Main controller for NetworkInfo VPC management.
pub struct Controller {
    config: ControllerConfig,
    reconciler: Arc<Reconciler>,
    watcher: Arc<Watcher>,
    server_state: Arc<ServerState>,
    requeues: UnboundedReceiver<ObjectRef<NetworkInfo>>,
}

impl Controller {
    /// Creates a new controller instance and loads startup state.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing NetworkInfo Controller");

        let kube_client = Client::try_default().await?;

        let nsx = NsxClient::new(
            config.nsx_url.clone(),
            config.nsx_username.clone(),
            config.nsx_password.clone(),
            config.nsx_insecure,
        )?;
        info!("Validating NSX credentials and connectivity...");
        nsx.validate_credentials().await.map_err(|e| {
            error!("Failed to reach NSX manager at {}: {}", config.nsx_url, e);
            e
        })?;
        info!("NSX connectivity established");

        let vpc_service = VpcService::new(nsx, config.cluster_name.clone(), config.lb_provider);
        vpc_service.initialize().await?;

        let events: Arc<dyn EventPublisher> = if config.emit_events {
            Arc::new(KubeEventPublisher::new(kube_client.clone()))
        } else {
            info!("Kubernetes Event publishing disabled");
            Arc::new(NoopEventPublisher)
        };
        let metrics = Arc::new(Metrics::new()?);
        let (queue, requeues) = NetworkInfoQueue::new();
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(vpc_service),
            Arc::new(KubeClusterClient::new(kube_client.clone())),
            Arc::new(NetworkConfigRegistry::new()),
            events,
            Arc::clone(&metrics),
            queue,
        ));
        load_registry(&reconciler).await?;

        let watcher = Arc::new(Watcher::new(
            Arc::clone(&reconciler),
            kube_client,
            config.watch_namespace.clone(),
            config.concurrency,
        ));

        Ok(Self {
            server_state: Arc::new(ServerState::new(metrics)),
            config,
            reconciler,
            watcher,
            requeues,
        })
    }

    /// Runs the controller until a task exits or ctrl-c is received.
    pub async fn run(self) -> Result<(), ControllerError> {
        let Self {
            config,
            reconciler,
            watcher,
            server_state,
            requeues,
        } = self;

        let mut metrics_server: JoinHandle<std::io::Result<()>> =
            tokio::spawn(metrics::serve(Arc::clone(&server_state), config.metrics_addr));
        let mut controller: JoinHandle<Result<(), ControllerError>> = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.run_network_info_controller(requeues).await })
        };
        let mut deletions = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_network_info_deletions().await })
        };
        let mut namespaces = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_namespaces().await })
        };
        let mut configs = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.watch_vpc_network_configurations().await })
        };
        let mut gc = tokio::spawn(Arc::clone(&reconciler).run_gc_loop(config.gc_interval));
        let mut drift = tokio::spawn(Arc::clone(&reconciler).run_drift_loop(config.drift_interval));

        server_state.mark_ready();
        info!("NetworkInfo Controller running");

        let result = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                Ok(())
            }
            result = &mut metrics_server => flatten("metrics server", result.map(|r| r.map_err(|e| ControllerError::Watch(e.to_string())))),
            result = &mut controller => flatten("NetworkInfo controller", result),
            result = &mut deletions => flatten("NetworkInfo deletion watcher", result),
            result = &mut namespaces => flatten("Namespace watcher", result),
            result = &mut configs => flatten("VPCNetworkConfiguration watcher", result),
            result = &mut gc => flatten("garbage collector", result.map(Ok)),
            result = &mut drift => flatten("drift detector", result.map(Ok)),
        };

        for handle in [controller, deletions, namespaces, configs] {
            handle.abort();
        }
        metrics_server.abort();
        gc.abort();
        drift.abort();
        info!("NetworkInfo Controller stopped");
        result
    }
}

fn flatten(
    task: &str,
    result: Result<Result<(), ControllerError>, tokio::task::JoinError>,
) -> Result<(), ControllerError> {
    let err = match result {
        Ok(Ok(())) => ControllerError::Watch(format!("{} exited", task)),
        Ok(Err(e)) => e,
        Err(e) => ControllerError::Watch(format!("{} panicked: {}", task, e)),
    };
    error!("{} stopped: {}", task, err);
    Err(err)
}

/// Populate the registry from a full list of configurations and Namespaces
/// before any reconciliation runs.
async fn load_registry(reconciler: &Reconciler) -> Result<(), ControllerError> {
    let configs = reconciler.cluster.list_vpc_network_configurations().await?;
    for config in &configs {
        match build_network_config_info(config) {
            Ok(info) => {
                let name = info.name.clone();
                reconciler.registry.register(&name, info);
            }
            Err(e) => warn!("Skipping VPCNetworkConfiguration: {}", e),
        }
    }

    let namespaces = reconciler.cluster.list_namespaces().await?;
    let bound = namespaces
        .iter()
        .filter(|ns| reconciler.sync_namespace(ns))
        .count();

    info!(
        "Loaded {} VPCNetworkConfiguration(s) and {} namespace binding(s)",
        reconciler.registry.config_names().len(),
        bound
    );
    Ok(())
}
