//! VPC topology resolution.
//!
//! Pre-created VPCs are read from NSX; operator-managed VPCs are described
//! by their configuration. The load balancer provider is matched here and
//! nowhere else in the pass.

use super::Reconciler;
use crate::error::ControllerError;
use nsx_client::{LbProvider, Vpc, VpcNetworkConfigInfo};
use tracing::debug;

/// Load balancer attached to the namespace's VPC
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoadBalancer {
    None,
    /// NSX native load balancer service
    Nsx { lbs_path: String },
    /// AVI; its subnet is resolved later, and only when the VPC endpoint is enabled
    Avi,
}

impl LoadBalancer {
    pub(crate) fn nsx_lbs_path(&self) -> &str {
        match self {
            LoadBalancer::Nsx { lbs_path } => lbs_path,
            LoadBalancer::None | LoadBalancer::Avi => "",
        }
    }
}

/// Everything the pass needs to know about the VPC beyond the VPC object
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VpcTopology {
    pub private_ips: Vec<String>,
    pub profile_path: String,
    pub load_balancer: LoadBalancer,
}

impl Reconciler {
    pub(crate) async fn resolve_topology(
        &self,
        config: &VpcNetworkConfigInfo,
        vpc: &Vpc,
        lb_provider: LbProvider,
    ) -> Result<VpcTopology, ControllerError> {
        let pre_created = config.is_pre_created();

        let (private_ips, profile_path) = if pre_created {
            let attachments = self.gateway.list_vpc_attachments(&vpc.path).await?;
            let attachment = attachments.into_iter().next().ok_or_else(|| {
                ControllerError::Topology(format!("no VPC attachment found under {}", vpc.path))
            })?;
            (vpc.private_ips.clone(), attachment.vpc_connectivity_profile)
        } else {
            (
                config.private_ips.clone(),
                config.vpc_connectivity_profile.clone(),
            )
        };

        let load_balancer = match lb_provider {
            LbProvider::None => LoadBalancer::None,
            LbProvider::Avi => LoadBalancer::Avi,
            LbProvider::NsxLb if pre_created => {
                // The load balancer of a pre-created VPC must already exist
                let lbs_path = self.gateway.get_lbs_path_by_vpc(&vpc.path).await?;
                if lbs_path.is_empty() {
                    return Err(ControllerError::Topology(format!(
                        "no NSX load balancer found in pre-created VPC {}",
                        vpc.path
                    )));
                }
                LoadBalancer::Nsx { lbs_path }
            }
            LbProvider::NsxLb => LoadBalancer::Nsx {
                lbs_path: self.gateway.get_default_nsx_lbs_path_by_vpc(vpc),
            },
        };

        debug!(
            vpc = %vpc.path,
            pre_created,
            "Resolved topology: profile {}, load balancer {:?}",
            profile_path, load_balancer
        );

        Ok(VpcTopology {
            private_ips,
            profile_path,
            load_balancer,
        })
    }
}
