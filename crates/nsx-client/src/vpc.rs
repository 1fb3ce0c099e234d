//! VPC gateway backed by the NSX Policy API
//!
//! Operator-managed VPCs are written with a fixed tag set so they can be
//! found again by namespace, namespace UID and NetworkInfo UID. Pre-created
//! VPCs are only ever read.

use crate::client::NsxClient;
use crate::error::NsxError;
use crate::gateway_trait::VpcGatewayTrait;
use crate::models::*;
use crate::store::VpcStore;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Gateway reason: the project has no transit gateway connection
pub const REASON_GATEWAY_CONNECTION_NOT_SET: &str = "GatewayConnectionNotSet";
/// Gateway reason: the project has a centralized connection but no edge cluster
pub const REASON_EDGE_MISSING_IN_PROJECT: &str = "EdgeMissingInProject";

const CENTRALIZED_CONNECTION_SEGMENT: &str = "/gateway-connections/";
const DISTRIBUTED_CONNECTION_SEGMENT: &str = "/distributed-gateway-connections/";

/// `VpcGatewayTrait` implementation over `NsxClient`
#[derive(Debug)]
pub struct VpcService {
    client: NsxClient,
    cluster: String,
    lb_provider: LbProvider,
    store: VpcStore,
    shared_namespaces: RwLock<HashMap<String, String>>,
}

impl VpcService {
    pub fn new(client: NsxClient, cluster: String, lb_provider: LbProvider) -> Self {
        Self {
            client,
            cluster,
            lb_provider,
            store: VpcStore::new(),
            shared_namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Load every VPC tagged with this cluster into the store
    pub async fn initialize(&self) -> Result<(), NsxError> {
        let vpcs = self.client.search_cluster_vpcs(&self.cluster).await?;
        info!(
            "Loaded {} operator-managed VPCs for cluster {}",
            vpcs.len(),
            self.cluster
        );
        self.store.replace_all(vpcs);
        Ok(())
    }

    pub fn store(&self) -> &VpcStore {
        &self.store
    }

    /// Existing store entry for this owner, by CR UID first, then by namespace UID
    fn existing_vpc(&self, owner: &VpcOwner) -> Option<Vpc> {
        self.store.by_cr_uid(&owner.uid).or_else(|| {
            self.store
                .by_namespace(&owner.namespace)
                .into_iter()
                .find(|v| v.namespace_uid() == Some(owner.namespace_uid.as_str()))
        })
    }

    fn profile_path(config: &VpcNetworkConfigInfo, profile: &str) -> String {
        if profile.starts_with('/') {
            profile.to_string()
        } else {
            format!("{}/vpc-connectivity-profiles/{}", config.project_path(), profile)
        }
    }
}

/// Tags written on an operator-managed VPC
pub fn build_owner_tags(cluster: &str, owner: &VpcOwner) -> Vec<Tag> {
    vec![
        Tag::new(TAG_SCOPE_CLUSTER, cluster),
        Tag::new(TAG_SCOPE_NAMESPACE, owner.namespace.clone()),
        Tag::new(TAG_SCOPE_NAMESPACE_UID, owner.namespace_uid.clone()),
        Tag::new(TAG_SCOPE_VPC_CR_NAME, owner.name.clone()),
        Tag::new(TAG_SCOPE_VPC_CR_UID, owner.uid.clone()),
    ]
}

/// `{namespace}-{first 8 chars of namespace UID}`
pub fn build_vpc_id(owner: &VpcOwner) -> String {
    let suffix: String = owner.namespace_uid.chars().take(8).collect();
    if suffix.is_empty() {
        owner.namespace.clone()
    } else {
        format!("{}-{}", owner.namespace, suffix)
    }
}

fn vpc_matches(existing: &Vpc, desired: &Vpc) -> bool {
    existing.display_name == desired.display_name
        && existing.private_ips == desired.private_ips
        && existing.is_lb_endpoint_enabled() == desired.is_lb_endpoint_enabled()
        && desired.tags.iter().all(|t| existing.tags.contains(t))
}

#[async_trait::async_trait]
impl VpcGatewayTrait for VpcService {
    async fn create_or_update_vpc(
        &self,
        owner: &VpcOwner,
        config: &VpcNetworkConfigInfo,
        lb_provider: LbProvider,
    ) -> Result<Vpc, NsxError> {
        if let Some(path) = config.vpc_path.as_deref().filter(|p| !p.is_empty()) {
            debug!(
                "Namespace {} uses pre-created VPC {}",
                owner.namespace, path
            );
            return self.client.get_vpc(path).await;
        }

        let existing = self.existing_vpc(owner);
        let vpc_id = existing
            .as_ref()
            .map_or_else(|| build_vpc_id(owner), |v| v.id.clone());
        let vpc_path = format!("{}/vpcs/{}", config.project_path(), vpc_id);

        let desired = Vpc {
            id: vpc_id,
            path: vpc_path.clone(),
            display_name: owner.namespace.clone(),
            private_ips: config.private_ips.clone(),
            tags: build_owner_tags(&self.cluster, owner),
            load_balancer_vpc_endpoint: Some(LoadBalancerVpcEndpoint {
                enabled: Some(lb_provider == LbProvider::Avi),
            }),
            short_id: None,
        };

        if let Some(existing) = existing.filter(|e| vpc_matches(e, &desired)) {
            debug!("VPC {} is up to date", existing.path);
            return Ok(existing);
        }

        info!("Creating or updating VPC {}", vpc_path);
        self.client.patch_vpc(&vpc_path, &desired).await?;

        let attachment = VpcAttachment {
            id: "default".to_string(),
            path: String::new(),
            vpc_connectivity_profile: Self::profile_path(config, &config.vpc_connectivity_profile),
        };
        self.client.patch_vpc_attachment(&vpc_path, &attachment).await?;

        if lb_provider == LbProvider::NsxLb {
            let lbs = LbService {
                id: DEFAULT_LBS_ID.to_string(),
                path: String::new(),
                connectivity_path: Some(vpc_path.clone()),
            };
            self.client.patch_lb_service(&vpc_path, &lbs).await?;
        }

        let created = self.client.get_vpc(&vpc_path).await?;
        self.store.apply(created.clone());
        Ok(created)
    }

    async fn delete_vpc(&self, path: &str) -> Result<(), NsxError> {
        match self.client.delete_vpc(path).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!("VPC {} already deleted", path);
            }
            Err(e) => return Err(e),
        }
        self.store.remove(path);
        info!("Deleted VPC {}", path);
        Ok(())
    }

    fn list_vpc(&self) -> Vec<Vpc> {
        self.store.list()
    }

    fn get_vpcs_by_namespace(&self, ns: &str) -> Vec<Vpc> {
        self.store.by_namespace(ns)
    }

    async fn list_vpc_attachments(&self, vpc_path: &str) -> Result<Vec<VpcAttachment>, NsxError> {
        self.client.list_vpc_attachments(vpc_path).await
    }

    async fn validate_gateway_connection_status(
        &self,
        config: &VpcNetworkConfigInfo,
    ) -> Result<(bool, String), NsxError> {
        let project_path = config.project_path();
        let attachments = self
            .client
            .list_transit_gateway_attachments(&project_path)
            .await?;

        let centralized = attachments
            .iter()
            .any(|a| a.connection_path.contains(CENTRALIZED_CONNECTION_SEGMENT));
        let distributed = attachments
            .iter()
            .any(|a| a.connection_path.contains(DISTRIBUTED_CONNECTION_SEGMENT));

        if centralized {
            let project = self.client.get_project(&project_path).await?;
            let has_edge = project
                .site_infos
                .iter()
                .any(|s| !s.edge_cluster_paths.is_empty());
            if !has_edge {
                warn!("Project {} has a gateway connection but no edge cluster", project_path);
                return Ok((false, REASON_EDGE_MISSING_IN_PROJECT.to_string()));
            }
            return Ok((true, String::new()));
        }
        if distributed {
            return Ok((true, String::new()));
        }
        Ok((false, REASON_GATEWAY_CONNECTION_NOT_SET.to_string()))
    }

    async fn get_vpc_connectivity_profile(
        &self,
        config: &VpcNetworkConfigInfo,
        profile_path: &str,
    ) -> Result<VpcConnectivityProfile, NsxError> {
        if profile_path.is_empty() {
            return Err(NsxError::InvalidRequest(format!(
                "configuration {} has no VPC connectivity profile",
                config.name
            )));
        }
        self.client
            .get_vpc_connectivity_profile(&Self::profile_path(config, profile_path))
            .await
    }

    async fn get_default_snat_ip(&self, vpc: &Vpc) -> Result<String, NsxError> {
        let rules = self.client.list_nat_rules(&vpc.path).await?;
        rules
            .into_iter()
            .filter(|r| r.action.eq_ignore_ascii_case("SNAT"))
            .filter(|r| {
                r.id.to_ascii_lowercase().contains("default")
                    || r.display_name.to_ascii_lowercase().contains("default")
            })
            .find_map(|r| r.translated_network.filter(|n| !n.is_empty()))
            .ok_or_else(|| NsxError::NotFound(format!("default SNAT rule in VPC {}", vpc.path)))
    }

    async fn get_avi_subnet_info(&self, vpc: &Vpc) -> Result<(String, String), NsxError> {
        let subnet = self.client.get_subnet(&vpc.path, AVI_SUBNET_LB_ID).await?;
        let cidr = subnet.ip_addresses.first().cloned().ok_or_else(|| {
            NsxError::Api(format!("AVI subnet {} has no IP addresses", subnet.path))
        })?;
        Ok((subnet.path, cidr))
    }

    async fn get_lbs_path_by_vpc(&self, vpc_path: &str) -> Result<String, NsxError> {
        let services = self.client.list_lb_services(vpc_path).await?;
        Ok(services.into_iter().next().map(|s| s.path).unwrap_or_default())
    }

    fn get_default_nsx_lbs_path_by_vpc(&self, vpc: &Vpc) -> String {
        format!("{}/vpc-lbs/{}", vpc.path, DEFAULT_LBS_ID)
    }

    fn is_enable_auto_snat(&self, profile: &VpcConnectivityProfile) -> bool {
        is_auto_snat_enabled(profile)
    }

    fn get_lb_provider(&self) -> LbProvider {
        self.lb_provider
    }

    async fn is_shared_vpc_namespace_by_ns(&self, ns: &str) -> Result<bool, NsxError> {
        Ok(self
            .shared_namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(ns))
    }

    fn register_shared_namespace(&self, ns: &str, owner_ns: Option<&str>) {
        let mut shared = self
            .shared_namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match owner_ns.filter(|o| !o.is_empty() && *o != ns) {
            Some(owner) => {
                shared.insert(ns.to_string(), owner.to_string());
            }
            None => {
                shared.remove(ns);
            }
        }
    }

    async fn get_all_vpcs_from_nsx(&self) -> Result<HashMap<String, Vpc>, NsxError> {
        let vpcs = self.client.search_vpcs().await?;
        Ok(vpcs.into_iter().map(|v| (v.path.clone(), v)).collect())
    }
}

/// Default SNAT requires an enabled service gateway with default SNAT on
pub fn is_auto_snat_enabled(profile: &VpcConnectivityProfile) -> bool {
    let Some(gateway) = profile.service_gateway.as_ref() else {
        return false;
    };
    if !gateway.enable.unwrap_or(false) {
        return false;
    }
    gateway
        .nat_config
        .as_ref()
        .and_then(|n| n.enable_default_snat)
        .unwrap_or(false)
}
