//! VPCNetworkConfiguration watch handling.
//!
//! Keeps the registry current and re-enqueues the NetworkInfo objects a
//! configuration change affects. Deleting a configuration leaves its
//! registry entry in place; entries are evicted only when a full relist no
//! longer contains them.

use super::Reconciler;
use crate::conditions::is_condition_true;
use crate::registry::build_network_config_info;
use crate::status::same_ip_set;
use crds::{CONDITION_GATEWAY_CONNECTION_READY, VPCNetworkConfiguration};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles VPCNetworkConfiguration watch events.
///
/// Owned by the single task consuming the watch stream.
#[derive(Debug)]
pub struct ConfigChangeHandler {
    reconciler: Arc<Reconciler>,
    /// Names seen since the current relist began
    relist: Option<HashSet<String>>,
    /// Last observed gateway readiness of the system configuration
    system_gateway_ready: Option<bool>,
}

impl ConfigChangeHandler {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            relist: None,
            system_gateway_ready: None,
        }
    }

    /// Register a created or updated configuration.
    ///
    /// Returns the number of NetworkInfo objects re-enqueued.
    pub async fn on_apply(&mut self, config: &VPCNetworkConfiguration) -> usize {
        let info = match build_network_config_info(config) {
            Ok(info) => info,
            Err(e) => {
                warn!("Ignoring VPCNetworkConfiguration: {}", e);
                return 0;
            }
        };
        let name = info.name.clone();
        if let Some(seen) = self.relist.as_mut() {
            seen.insert(name.clone());
        }

        let registry = &self.reconciler.registry;
        let previous = registry.get(&name);
        let private_ips_changed = previous
            .as_ref()
            .is_some_and(|p| !same_ip_set(&p.private_ips, &info.private_ips));
        registry.register(&name, info);

        if config.is_system() {
            let ready = config
                .status
                .as_ref()
                .is_some_and(|s| is_condition_true(&s.conditions, CONDITION_GATEWAY_CONNECTION_READY));
            let was_ready = self.system_gateway_ready.replace(ready);
            if was_ready.is_some_and(|r| r != ready) {
                info!("System gateway readiness changed to {}, re-enqueueing all NetworkInfos", ready);
                return self.enqueue_all().await;
            }
        }

        if private_ips_changed {
            info!("Private IPs of VPCNetworkConfiguration {} changed", name);
            return self.enqueue_config_users(&name).await;
        }
        0
    }

    /// Deletion is not acted on; see the module docs
    pub fn on_delete(&self, config: &VPCNetworkConfiguration) {
        debug!(
            "VPCNetworkConfiguration {} deleted, keeping registry entry",
            config.metadata.name.as_deref().unwrap_or("<unknown>")
        );
    }

    /// A full relist is starting
    pub fn on_init(&mut self) {
        self.relist = Some(HashSet::new());
    }

    /// A full relist finished. Returns the evicted configuration names.
    pub fn on_init_done(&mut self) -> Vec<String> {
        match self.relist.take() {
            Some(seen) => self.reconciler.registry.retain_configs(&seen),
            None => Vec::new(),
        }
    }

    async fn enqueue_all(&self) -> usize {
        match self.reconciler.cluster.list_network_infos(None).await {
            Ok(list) => list
                .iter()
                .filter_map(|ni| Some((ni.metadata.namespace.as_deref()?, ni.metadata.name.as_deref()?)))
                .filter(|(namespace, name)| self.reconciler.queue.enqueue(namespace, name))
                .count(),
            Err(e) => {
                warn!("Failed to list NetworkInfos: {}", e);
                0
            }
        }
    }

    async fn enqueue_config_users(&self, config_name: &str) -> usize {
        let namespaces = match self.reconciler.cluster.list_namespaces().await {
            Ok(list) => list,
            Err(e) => {
                warn!("Failed to list Namespaces: {}", e);
                return 0;
            }
        };
        let names: Vec<&str> = namespaces
            .iter()
            .filter_map(|ns| ns.metadata.name.as_deref())
            .collect();
        let mut count = 0;
        for namespace in self.reconciler.registry.namespaces_using(config_name, names) {
            count += self.reconciler.enqueue_namespace(&namespace).await;
        }
        count
    }
}

#[cfg(test)]
#[path = "config_handler_test.rs"]
mod config_handler_test;
