//! Kubernetes resource watchers.
//!
//! NetworkInfo reconciliation runs on `kube_runtime::Controller`. The
//! configuration and Namespace watchers feed the registry, and a second
//! NetworkInfo watch drives deletion, which the runtime cannot reconcile
//! once the object has left its cache.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::reconciler::config_handler::ConfigChangeHandler;
use crate::requeue::{self, REQUEUE_TRANSIENT};
use crds::{NetworkInfo, VPCNetworkConfiguration};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{Controller, WatchStreamExt, watcher};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

async fn reconcile(network_info: Arc<NetworkInfo>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let namespace = network_info
        .namespace()
        .ok_or_else(|| ControllerError::InvalidConfig("NetworkInfo missing namespace".to_string()))?;
    ctx.reconcile_network_info(&namespace, &network_info.name_any()).await
}

fn error_policy(network_info: Arc<NetworkInfo>, error: &ControllerError, _ctx: Arc<Reconciler>) -> Action {
    warn!(
        "Reconciliation of NetworkInfo {}/{} failed, retrying: {}",
        network_info.namespace().unwrap_or_default(),
        network_info.name_any(),
        error
    );
    requeue::for_error(error)
}

/// Watches Kubernetes resources for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    client: Client,
    watch_namespace: Option<String>,
    concurrency: u16,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        reconciler: Arc<Reconciler>,
        client: Client,
        watch_namespace: Option<String>,
        concurrency: u16,
    ) -> Self {
        Self {
            reconciler,
            client,
            watch_namespace,
            concurrency,
        }
    }

    fn network_info_api(&self) -> Api<NetworkInfo> {
        match self.watch_namespace.as_deref() {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    /// Run the NetworkInfo controller. `requeues` carries keys enqueued by
    /// the drift detector and the watch handlers.
    pub async fn run_network_info_controller(
        &self,
        requeues: UnboundedReceiver<ObjectRef<NetworkInfo>>,
    ) -> Result<(), ControllerError> {
        info!("Starting NetworkInfo controller with concurrency {}", self.concurrency);

        let requeues = futures::stream::unfold(requeues, |mut rx| async move {
            rx.recv().await.map(|key| (key, rx))
        });

        Controller::new(self.network_info_api(), watcher::Config::default())
            .with_config(RuntimeConfig::default().concurrency(self.concurrency))
            .reconcile_on(requeues)
            .run(reconcile, error_policy, Arc::clone(&self.reconciler))
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled NetworkInfo {}", obj),
                    Err(e) => debug!("NetworkInfo controller error: {}", e),
                }
            })
            .await;

        Err(ControllerError::Watch("NetworkInfo controller stopped".to_string()))
    }

    /// Turn NetworkInfo deletions into deletion passes.
    pub async fn watch_network_info_deletions(&self) -> Result<(), ControllerError> {
        info!("Starting NetworkInfo deletion watcher");

        let mut stream = Box::pin(
            watcher(self.network_info_api(), watcher::Config::default()).default_backoff(),
        );
        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Delete(ni)) => {
                    let (Some(namespace), name) = (ni.namespace(), ni.name_any()) else {
                        continue;
                    };
                    info!("NetworkInfo {}/{} deleted", namespace, name);
                    tokio::spawn(delete_until_done(Arc::clone(&self.reconciler), namespace, name));
                }
                Ok(_) => {}
                Err(e) => warn!("NetworkInfo deletion watch error: {}", e),
            }
        }

        Err(ControllerError::Watch("NetworkInfo deletion watch ended".to_string()))
    }

    /// Keep namespace bindings and shared VPC namespaces current.
    pub async fn watch_namespaces(&self) -> Result<(), ControllerError> {
        info!("Starting Namespace watcher");

        let api: Api<Namespace> = Api::all(self.client.clone());
        let mut stream = Box::pin(watcher(api, watcher::Config::default()).default_backoff());
        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Apply(ns) | watcher::Event::InitApply(ns)) => {
                    let enqueued = self.reconciler.handle_namespace_apply(&ns).await;
                    if enqueued > 0 {
                        debug!("Namespace {} change enqueued {} NetworkInfo(s)", ns.name_any(), enqueued);
                    }
                }
                Ok(watcher::Event::Delete(ns)) => self.reconciler.handle_namespace_delete(&ns),
                Ok(watcher::Event::Init | watcher::Event::InitDone) => {
                    debug!("Namespace watcher (re)initialized");
                }
                Err(e) => warn!("Namespace watch error: {}", e),
            }
        }

        Err(ControllerError::Watch("Namespace watch ended".to_string()))
    }

    /// Keep the configuration registry current.
    pub async fn watch_vpc_network_configurations(&self) -> Result<(), ControllerError> {
        info!("Starting VPCNetworkConfiguration watcher");

        let mut handler = ConfigChangeHandler::new(Arc::clone(&self.reconciler));
        let api: Api<VPCNetworkConfiguration> = Api::all(self.client.clone());
        let mut stream = Box::pin(watcher(api, watcher::Config::default()).default_backoff());
        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Apply(config) | watcher::Event::InitApply(config)) => {
                    let enqueued = handler.on_apply(&config).await;
                    if enqueued > 0 {
                        info!(
                            "VPCNetworkConfiguration {} change enqueued {} NetworkInfo(s)",
                            config.name_any(),
                            enqueued
                        );
                    }
                }
                Ok(watcher::Event::Delete(config)) => handler.on_delete(&config),
                Ok(watcher::Event::Init) => handler.on_init(),
                Ok(watcher::Event::InitDone) => {
                    let evicted = handler.on_init_done();
                    if !evicted.is_empty() {
                        info!("Evicted stale VPCNetworkConfigurations: {:?}", evicted);
                    }
                }
                Err(e) => warn!("VPCNetworkConfiguration watch error: {}", e),
            }
        }

        Err(ControllerError::Watch("VPCNetworkConfiguration watch ended".to_string()))
    }
}

/// Retry the deletion pass at the transient interval until it succeeds
/// or the object is recreated
pub(crate) async fn delete_until_done(reconciler: Arc<Reconciler>, namespace: String, name: String) {
    loop {
        match reconciler.reconcile_deleted_network_info(&namespace, &name).await {
            Ok(true) => return,
            Ok(false) => {
                info!("NetworkInfo {}/{} was recreated, leaving it to the controller", namespace, name);
                return;
            }
            Err(e) => {
                error!("Deletion of NetworkInfo {}/{} failed, retrying: {}", namespace, name, e);
                tokio::time::sleep(REQUEUE_TRANSIENT).await;
            }
        }
    }
}

#[cfg(test)]
#[path = "watcher_test.rs"]
mod watcher_test;
