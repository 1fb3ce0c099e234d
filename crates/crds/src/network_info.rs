//! NetworkInfo CRD
//!
//! One per namespace that requests networking. The controller records the
//! VPC it provisioned for the namespace in `spec.vpcs` and its own
//! readiness in `status.conditions`.

use crate::condition::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "crd.nsx.vmware.com",
    version = "v1alpha1",
    kind = "NetworkInfo",
    namespaced,
    status = "NetworkInfoStatus",
    shortname = "ni"
)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfoSpec {
    /// Observed VPC state for this namespace.
    ///
    /// Written by the controller through main-resource updates. Holds at
    /// most one entry because a namespace maps to at most one VPC.
    #[serde(default)]
    pub vpcs: Vec<VPCState>,
}

/// Observed state of the VPC backing a namespace
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct VPCState {
    /// VPC display name
    pub name: String,

    /// Default SNAT IP of the VPC (empty when auto-SNAT is disabled)
    #[serde(rename = "defaultSNATIP", default)]
    pub default_snat_ip: String,

    /// Load balancer subnet CIDR (third-party LB only)
    #[serde(rename = "loadBalancerIPAddresses", default)]
    pub load_balancer_ip_addresses: String,

    /// Private IP ranges of the VPC
    #[serde(rename = "privateIPs", default)]
    pub private_ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfoStatus {
    /// Readiness of the last reconciliation pass
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
