//! VPC gateway trait for mocking
//!
//! This trait is the controller's whole view of NSX. `VpcService`
//! implements it against the Policy API, and tests use `MockVpcGateway`.

use crate::error::NsxError;
use crate::models::*;
use std::collections::HashMap;

/// Trait for VPC lifecycle and topology operations on NSX
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait VpcGatewayTrait: Send + Sync {
    /// Create or update the VPC backing `owner` under `config`.
    ///
    /// For a pre-created configuration this reads the existing VPC and never
    /// writes to it.
    async fn create_or_update_vpc(
        &self,
        owner: &VpcOwner,
        config: &VpcNetworkConfigInfo,
        lb_provider: LbProvider,
    ) -> Result<Vpc, NsxError>;

    /// Delete an operator-managed VPC by path
    async fn delete_vpc(&self, path: &str) -> Result<(), NsxError>;

    /// Operator-managed VPCs in the local store
    fn list_vpc(&self) -> Vec<Vpc>;

    /// Operator-managed VPCs tagged with namespace `ns`
    fn get_vpcs_by_namespace(&self, ns: &str) -> Vec<Vpc>;

    /// Attachments of the VPC at `vpc_path` (connectivity profile bindings)
    async fn list_vpc_attachments(&self, vpc_path: &str) -> Result<Vec<VpcAttachment>, NsxError>;

    /// Check the project's gateway connection. Returns `(ready, reason)`.
    async fn validate_gateway_connection_status(
        &self,
        config: &VpcNetworkConfigInfo,
    ) -> Result<(bool, String), NsxError>;

    async fn get_vpc_connectivity_profile(
        &self,
        config: &VpcNetworkConfigInfo,
        profile_path: &str,
    ) -> Result<VpcConnectivityProfile, NsxError>;

    /// Default SNAT IP of the VPC
    async fn get_default_snat_ip(&self, vpc: &Vpc) -> Result<String, NsxError>;

    /// AVI LB subnet `(path, cidr)` of the VPC
    async fn get_avi_subnet_info(&self, vpc: &Vpc) -> Result<(String, String), NsxError>;

    /// Path of the LB service in the VPC, empty when it has none
    async fn get_lbs_path_by_vpc(&self, vpc_path: &str) -> Result<String, NsxError>;

    /// Path of the default LB service the operator creates in its own VPCs,
    /// derived from the VPC's identity without an NSX call
    fn get_default_nsx_lbs_path_by_vpc(&self, vpc: &Vpc) -> String;

    fn is_enable_auto_snat(&self, profile: &VpcConnectivityProfile) -> bool;

    fn get_lb_provider(&self) -> LbProvider;

    /// True when `ns` consumes another namespace's VPC
    async fn is_shared_vpc_namespace_by_ns(&self, ns: &str) -> Result<bool, NsxError>;

    /// Record (or clear) the namespace whose VPC `ns` shares
    fn register_shared_namespace(&self, ns: &str, owner_ns: Option<&str>);

    /// Every VPC NSX knows about, keyed by path
    async fn get_all_vpcs_from_nsx(&self) -> Result<HashMap<String, Vpc>, NsxError>;
}
