//! In-memory registry of VPC network configurations.
//!
//! Populated at startup by a full list and kept current by the
//! configuration and Namespace watchers. Reconciliations only read it.
//! Both maps sit behind read-mostly locks so watch handlers can write while
//! reconciliations read.

use crate::error::ControllerError;
use crds::VPCNetworkConfiguration;
use nsx_client::{VpcNetworkConfigInfo, parse_org_project};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct NetworkConfigRegistry {
    /// Configuration name -> resolved configuration
    configs: RwLock<HashMap<String, VpcNetworkConfigInfo>>,
    /// Namespace name -> configuration name, from the Namespace annotation
    namespace_bindings: RwLock<HashMap<String, String>>,
}

impl NetworkConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a configuration (last write wins).
    ///
    /// Registering a default configuration clears the flag on any other
    /// entry so at most one default exists.
    pub fn register(&self, name: &str, info: VpcNetworkConfigInfo) {
        let mut configs = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        if info.is_default {
            for (other_name, other) in configs.iter_mut() {
                if other_name != name && other.is_default {
                    warn!(
                        "VPCNetworkConfiguration {} replaces {} as the default configuration",
                        name, other_name
                    );
                    other.is_default = false;
                }
            }
        }
        debug!("Registered VPCNetworkConfiguration {}", name);
        configs.insert(name.to_string(), info);
    }

    pub fn get(&self, name: &str) -> Option<VpcNetworkConfigInfo> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn get_default(&self) -> Option<VpcNetworkConfigInfo> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|c| c.is_default)
            .cloned()
    }

    /// Configuration bound to `ns`, else the default configuration
    pub fn get_by_namespace(&self, ns: &str) -> Option<VpcNetworkConfigInfo> {
        match self.binding(ns) {
            Some(name) => self.get(&name),
            None => self.get_default(),
        }
    }

    /// Configuration name explicitly bound to `ns`
    pub fn binding(&self, ns: &str) -> Option<String> {
        self.namespace_bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(ns)
            .cloned()
    }

    /// Bind a namespace to a configuration name. Returns true if the binding changed.
    pub fn register_namespace_binding(&self, ns: &str, config_name: &str) -> bool {
        let mut bindings = self
            .namespace_bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = bindings.insert(ns.to_string(), config_name.to_string());
        previous.as_deref() != Some(config_name)
    }

    /// Drop a namespace binding. Returns true if one existed.
    pub fn remove_namespace_binding(&self, ns: &str) -> bool {
        self.namespace_bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(ns)
            .is_some()
    }

    /// Namespaces resolving to the configuration `name`, from the given candidates
    pub fn namespaces_using<'a>(&self, name: &str, namespaces: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        namespaces
            .into_iter()
            .filter(|ns| self.get_by_namespace(ns).is_some_and(|c| c.name == name))
            .map(str::to_string)
            .collect()
    }

    /// Namespace -> pre-created VPC path, for bound namespaces whose
    /// configuration points at a pre-created VPC
    pub fn get_namespaces_with_pre_created_vpcs(&self) -> HashMap<String, String> {
        let bindings = self
            .namespace_bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let configs = self.configs.read().unwrap_or_else(PoisonError::into_inner);
        bindings
            .into_iter()
            .filter_map(|(ns, name)| {
                configs
                    .get(&name)
                    .filter(|c| c.is_pre_created())
                    .and_then(|c| c.vpc_path.clone())
                    .map(|path| (ns, path))
            })
            .collect()
    }

    /// Drop every configuration not in `live`. Used after a full relist.
    pub fn retain_configs(&self, live: &HashSet<String>) -> Vec<String> {
        let mut configs = self.configs.write().unwrap_or_else(PoisonError::into_inner);
        let stale: Vec<String> = configs
            .keys()
            .filter(|name| !live.contains(*name))
            .cloned()
            .collect();
        for name in &stale {
            info!("Evicting VPCNetworkConfiguration {} not present after relist", name);
            configs.remove(name);
        }
        stale
    }

    pub fn config_names(&self) -> Vec<String> {
        self.configs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// Resolve a VPCNetworkConfiguration CR into its registry record
pub fn build_network_config_info(
    config: &VPCNetworkConfiguration,
) -> Result<VpcNetworkConfigInfo, ControllerError> {
    let name = config
        .metadata
        .name
        .clone()
        .ok_or_else(|| ControllerError::InvalidConfig("VPCNetworkConfiguration missing name".to_string()))?;

    let vpc_path = config.spec.vpc.clone().filter(|p| !p.is_empty());
    // A pre-created VPC path also carries the org and project
    let scope_path = vpc_path.as_deref().unwrap_or(&config.spec.nsx_project);
    let (org, nsx_project) = parse_org_project(scope_path).ok_or_else(|| {
        ControllerError::InvalidConfig(format!(
            "VPCNetworkConfiguration {} has no valid project path (got {:?})",
            name, scope_path
        ))
    })?;

    let short_id = config
        .metadata
        .uid
        .as_deref()
        .map(|uid| uid.chars().take(8).collect::<String>());

    Ok(VpcNetworkConfigInfo {
        name,
        org,
        nsx_project,
        vpc_connectivity_profile: config.spec.vpc_connectivity_profile.clone(),
        vpc_path,
        private_ips: config.spec.private_ips.clone(),
        default_subnet_size: config.spec.default_subnet_size,
        is_default: config.is_default(),
        short_id,
    })
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
