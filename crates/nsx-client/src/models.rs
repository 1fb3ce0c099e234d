//! NSX Policy API data models
//!
//! Only the fields the controller reads or writes are modelled; unknown
//! fields are ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Tag scope: owning cluster
pub const TAG_SCOPE_CLUSTER: &str = "nsx-op/cluster";
/// Tag scope: Kubernetes namespace name
pub const TAG_SCOPE_NAMESPACE: &str = "nsx-op/namespace";
/// Tag scope: Kubernetes namespace UID
pub const TAG_SCOPE_NAMESPACE_UID: &str = "nsx-op/namespace_uid";
/// Tag scope: NetworkInfo name
pub const TAG_SCOPE_VPC_CR_NAME: &str = "nsx-op/vpc_cr_name";
/// Tag scope: NetworkInfo UID
pub const TAG_SCOPE_VPC_CR_UID: &str = "nsx-op/vpc_cr_uid";

/// Subnet id NSX reserves for the AVI load balancer in a VPC
pub const AVI_SUBNET_LB_ID: &str = "_AVI_SUBNET--LB";
/// Id of the default VPC load balancer service
pub const DEFAULT_LBS_ID: &str = "default";

/// NSX tag
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Tag {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub tag: String,
}

impl Tag {
    pub fn new(scope: &str, tag: impl Into<String>) -> Self {
        Self {
            scope: scope.to_string(),
            tag: tag.into(),
        }
    }
}

/// Look up the value of a tag scope
pub fn tag_value<'a>(tags: &'a [Tag], scope: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.scope == scope)
        .map(|t| t.tag.as_str())
}

/// List envelope returned by NSX list and search endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(default)]
    pub result_count: u64,
}

/// Load balancer endpoint settings on a VPC.
///
/// NSX omits `enabled` entirely when the endpoint is disabled, so a missing
/// value must be read as disabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LoadBalancerVpcEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// NSX VPC
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Vpc {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub private_ips: Vec<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_vpc_endpoint: Option<LoadBalancerVpcEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
}

impl Vpc {
    /// Namespace UID this VPC was created for, if operator-managed
    pub fn namespace_uid(&self) -> Option<&str> {
        tag_value(&self.tags, TAG_SCOPE_NAMESPACE_UID)
    }

    /// Namespace name this VPC was created for, if operator-managed
    pub fn namespace(&self) -> Option<&str> {
        tag_value(&self.tags, TAG_SCOPE_NAMESPACE)
    }

    /// UID of the NetworkInfo this VPC was created for
    pub fn cr_uid(&self) -> Option<&str> {
        tag_value(&self.tags, TAG_SCOPE_VPC_CR_UID)
    }

    /// True only when NSX explicitly reports the LB endpoint as enabled
    pub fn is_lb_endpoint_enabled(&self) -> bool {
        self.load_balancer_vpc_endpoint
            .as_ref()
            .and_then(|e| e.enabled)
            .unwrap_or(false)
    }
}

/// VPC attachment binding a VPC to a connectivity profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VpcAttachment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub vpc_connectivity_profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NatConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_default_snat: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServiceGateway {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat_config: Option<NatConfig>,
}

/// VPC connectivity profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VpcConnectivityProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub external_ip_blocks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_gateway: Option<ServiceGateway>,
}

/// VPC load balancer service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LbService {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectivity_path: Option<String>,
}

/// VPC subnet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Subnet {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

/// NAT rule under a VPC
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NatRule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_network: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SiteInfo {
    #[serde(default)]
    pub edge_cluster_paths: Vec<String>,
}

/// NSX project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub site_infos: Vec<SiteInfo>,
}

/// Attachment of a project transit gateway to a gateway connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TransitGatewayAttachment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub connection_path: String,
}

/// Load balancer provider in use for VPCs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LbProvider {
    /// No load balancer
    None,
    /// NSX native load balancer (VPC LB service)
    #[default]
    NsxLb,
    /// AVI, the third-party load balancer
    Avi,
}

impl LbProvider {
    /// Parse the configuration spelling (`none`, `nsx-lb`, `avi`)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Some(LbProvider::None),
            "nsx-lb" | "nsx" => Some(LbProvider::NsxLb),
            "avi" => Some(LbProvider::Avi),
            _ => None,
        }
    }
}

impl std::fmt::Display for LbProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LbProvider::None => write!(f, "none"),
            LbProvider::NsxLb => write!(f, "nsx-lb"),
            LbProvider::Avi => write!(f, "avi"),
        }
    }
}

/// Resolved, read-optimized view of a VPCNetworkConfiguration
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VpcNetworkConfigInfo {
    pub name: String,
    pub org: String,
    pub nsx_project: String,
    pub vpc_connectivity_profile: String,
    /// Path of a pre-created VPC
    pub vpc_path: Option<String>,
    pub private_ips: Vec<String>,
    pub default_subnet_size: u32,
    pub is_default: bool,
    pub short_id: Option<String>,
}

impl VpcNetworkConfigInfo {
    /// True when the configuration points at a VPC the operator does not own
    pub fn is_pre_created(&self) -> bool {
        self.vpc_path.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// `/orgs/{org}/projects/{project}`
    pub fn project_path(&self) -> String {
        format!("/orgs/{}/projects/{}", self.org, self.nsx_project)
    }
}

/// Identity of the NetworkInfo a VPC is provisioned for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VpcOwner {
    pub namespace: String,
    pub namespace_uid: String,
    pub name: String,
    pub uid: String,
}

/// Split an NSX policy path into (org, project).
///
/// Accepts project paths (`/orgs/o/projects/p`) and anything nested under
/// one (`/orgs/o/projects/p/vpcs/v`).
pub fn parse_org_project(path: &str) -> Option<(String, String)> {
    let mut parts = path.trim_start_matches('/').split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("orgs"), Some(org), Some("projects"), Some(project))
            if !org.is_empty() && !project.is_empty() =>
        {
            Some((org.to_string(), project.to_string()))
        }
        _ => None,
    }
}

/// Last segment of an NSX path
pub fn path_id(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}
