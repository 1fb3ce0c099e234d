//! VPCNetworkConfiguration CRD
//!
//! Cluster-scoped description of how namespaces get their VPC: either an
//! operator-managed VPC built from a project and connectivity profile, or a
//! pre-created VPC referenced by path.

use crate::condition::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Annotation marking the default configuration
pub const ANNOTATION_DEFAULT_NETWORK_CONFIG: &str = "nsx.vmware.com/default";
/// Namespace annotation naming the configuration that governs it
pub const ANNOTATION_VPC_NETWORK_CONFIG: &str = "nsx.vmware.com/vpc_network_config";
/// Namespace annotation naming the namespace whose VPC this namespace shares
pub const ANNOTATION_SHARED_VPC_NAMESPACE: &str = "nsx.vmware.com/shared_vpc_namespace";
/// Reserved name of the system configuration
pub const SYSTEM_VPC_NETWORK_CONFIG_NAME: &str = "system";

/// Condition: the project has a working gateway connection
pub const CONDITION_GATEWAY_CONNECTION_READY: &str = "GatewayConnectionReady";
/// Condition: the connectivity profile enables default SNAT
pub const CONDITION_AUTO_SNAT_ENABLED: &str = "AutoSnatEnabled";
/// Condition: the connectivity profile references external IP blocks
pub const CONDITION_EXTERNAL_IP_BLOCKS_CONFIGURED: &str = "ExternalIPBlocksConfigured";

fn default_subnet_size() -> u32 {
    32
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "crd.nsx.vmware.com",
    version = "v1alpha1",
    kind = "VPCNetworkConfiguration",
    status = "VPCNetworkConfigurationStatus",
    shortname = "vpcnetconfig"
)]
#[serde(rename_all = "camelCase")]
pub struct VPCNetworkConfigurationSpec {
    /// Path of a pre-created VPC. When set, the controller never creates or
    /// deletes the VPC, it only reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<String>,

    /// NSX project path, e.g. `/orgs/default/projects/proj-1`
    #[serde(default)]
    pub nsx_project: String,

    /// VPC connectivity profile path
    #[serde(default)]
    pub vpc_connectivity_profile: String,

    /// Private IP ranges for operator-managed VPCs
    #[serde(rename = "privateIPs", default)]
    pub private_ips: Vec<String>,

    /// Default size of subnets created in the VPC
    #[serde(default = "default_subnet_size")]
    pub default_subnet_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VPCNetworkConfigurationStatus {
    /// GatewayConnectionReady, AutoSnatEnabled and ExternalIPBlocksConfigured
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// One entry per VPC provisioned under this configuration
    #[serde(default)]
    pub vpcs: Vec<VPCInfo>,
}

/// Per-VPC status published on the configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VPCInfo {
    /// VPC display name
    pub name: String,

    /// AVI load balancer subnet path
    #[serde(default)]
    pub lb_subnet_path: String,

    /// NSX load balancer service path
    #[serde(default)]
    pub nsx_load_balancer_path: String,

    /// VPC path
    #[serde(default)]
    pub vpc_path: String,
}

impl VPCNetworkConfiguration {
    /// True when annotated as the default configuration
    pub fn is_default(&self) -> bool {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANNOTATION_DEFAULT_NETWORK_CONFIG))
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// True for the reserved system configuration
    pub fn is_system(&self) -> bool {
        self.metadata.name.as_deref() == Some(SYSTEM_VPC_NETWORK_CONFIG_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    #[test]
    fn test_spec_defaults_subnet_size() {
        let spec: VPCNetworkConfigurationSpec = serde_json::from_value(serde_json::json!({
            "nsxProject": "/orgs/default/projects/proj-1",
            "vpcConnectivityProfile": "/orgs/default/projects/proj-1/vpc-connectivity-profiles/default",
            "privateIPs": ["172.26.0.0/16"]
        }))
        .unwrap();
        assert_eq!(spec.default_subnet_size, 32);
        assert_eq!(spec.private_ips, vec!["172.26.0.0/16".to_string()]);
        assert!(spec.vpc.is_none());
    }

    #[test]
    fn test_default_and_system_markers() {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_DEFAULT_NETWORK_CONFIG.to_string(), "True".to_string());
        let config = VPCNetworkConfiguration {
            metadata: ObjectMeta {
                name: Some(SYSTEM_VPC_NETWORK_CONFIG_NAME.to_string()),
                annotations: Some(annotations),
                ..Default::default()
            },
            spec: VPCNetworkConfigurationSpec {
                vpc: None,
                nsx_project: String::new(),
                vpc_connectivity_profile: String::new(),
                private_ips: vec![],
                default_subnet_size: 32,
            },
            status: None,
        };
        assert!(config.is_default());
        assert!(config.is_system());
    }

    #[test]
    fn test_vpc_state_wire_names() {
        let state = crate::VPCState {
            name: "ns-1".to_string(),
            default_snat_ip: "10.0.0.1".to_string(),
            load_balancer_ip_addresses: String::new(),
            private_ips: vec!["172.26.0.0/24".to_string()],
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["defaultSNATIP"], "10.0.0.1");
        assert_eq!(value["privateIPs"][0], "172.26.0.0/24");
    }
}
