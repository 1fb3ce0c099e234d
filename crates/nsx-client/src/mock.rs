//! Mock VPC gateway for unit testing
//!
//! Keeps VPCs, profiles and per-VPC lookups in memory and records every
//! call so tests can assert on what the controller asked NSX to do.

use crate::error::NsxError;
use crate::gateway_trait::VpcGatewayTrait;
use crate::models::*;
use crate::vpc::{build_owner_tags, build_vpc_id, is_auto_snat_enabled};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const MOCK_CLUSTER: &str = "mock-cluster";

#[derive(Debug, Default)]
struct MockState {
    lb_provider: LbProvider,
    /// Operator-managed VPCs (the local store)
    managed_vpcs: HashMap<String, Vpc>,
    /// Pre-created VPCs visible in NSX but never in the store
    external_vpcs: HashMap<String, Vpc>,
    gateway_status: (bool, String),
    profiles: HashMap<String, VpcConnectivityProfile>,
    snat_ips: HashMap<String, String>,
    avi_subnets: HashMap<String, (String, String)>,
    lbs_paths: HashMap<String, String>,
    attachments: HashMap<String, Vec<VpcAttachment>>,
    shared_namespaces: HashMap<String, String>,
    lb_endpoint_override: Option<Option<LoadBalancerVpcEndpoint>>,
    failing_deletes: HashSet<String>,
    create_error: Option<String>,
    list_all_error: Option<String>,
    create_or_update_calls: usize,
    validate_gateway_calls: usize,
    avi_subnet_calls: usize,
    deleted_paths: Vec<String>,
}

/// Mock VpcGateway for testing
///
/// Cloning shares state, so a test can keep a handle while the controller
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MockVpcGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockVpcGateway {
    /// Create a mock using the given load balancer provider
    pub fn new(lb_provider: LbProvider) -> Self {
        let mock = Self::default();
        mock.lock().lb_provider = lb_provider;
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Setup

    /// Result returned by `validate_gateway_connection_status`
    pub fn set_gateway_status(&self, ready: bool, reason: &str) {
        self.lock().gateway_status = (ready, reason.to_string());
    }

    /// Register a connectivity profile under its path
    pub fn add_profile(&self, profile: VpcConnectivityProfile) {
        self.lock().profiles.insert(profile.path.clone(), profile);
    }

    /// Add an operator-managed VPC to the store
    pub fn add_managed_vpc(&self, vpc: Vpc) {
        self.lock().managed_vpcs.insert(vpc.path.clone(), vpc);
    }

    /// Add a pre-created VPC that only exists in NSX
    pub fn add_external_vpc(&self, vpc: Vpc) {
        self.lock().external_vpcs.insert(vpc.path.clone(), vpc);
    }

    pub fn remove_external_vpc(&self, path: &str) {
        self.lock().external_vpcs.remove(path);
    }

    pub fn set_snat_ip(&self, vpc_path: &str, ip: &str) {
        self.lock().snat_ips.insert(vpc_path.to_string(), ip.to_string());
    }

    pub fn set_avi_subnet(&self, vpc_path: &str, subnet_path: &str, cidr: &str) {
        self.lock().avi_subnets.insert(
            vpc_path.to_string(),
            (subnet_path.to_string(), cidr.to_string()),
        );
    }

    pub fn set_lbs_path(&self, vpc_path: &str, lbs_path: &str) {
        self.lock()
            .lbs_paths
            .insert(vpc_path.to_string(), lbs_path.to_string());
    }

    /// Attach a connectivity profile to the VPC at `vpc_path`
    pub fn add_attachment(&self, vpc_path: &str, profile_path: &str) {
        let mut state = self.lock();
        let attachments = state.attachments.entry(vpc_path.to_string()).or_default();
        attachments.push(VpcAttachment {
            id: format!("attachment-{}", attachments.len()),
            path: format!("{}/attachments/attachment-{}", vpc_path, attachments.len()),
            vpc_connectivity_profile: profile_path.to_string(),
        });
    }

    /// Force the LB endpoint reported on VPCs returned by `create_or_update_vpc`
    pub fn set_lb_endpoint(&self, endpoint: Option<LoadBalancerVpcEndpoint>) {
        self.lock().lb_endpoint_override = Some(endpoint);
    }

    /// Make `delete_vpc` fail for this path
    pub fn fail_delete(&self, path: &str) {
        self.lock().failing_deletes.insert(path.to_string());
    }

    /// Make `create_or_update_vpc` fail with this message
    pub fn fail_create(&self, message: &str) {
        self.lock().create_error = Some(message.to_string());
    }

    /// Make `get_all_vpcs_from_nsx` fail with this message
    pub fn fail_list_all(&self, message: &str) {
        self.lock().list_all_error = Some(message.to_string());
    }

    // Inspection

    pub fn create_or_update_calls(&self) -> usize {
        self.lock().create_or_update_calls
    }

    pub fn validate_gateway_calls(&self) -> usize {
        self.lock().validate_gateway_calls
    }

    pub fn avi_subnet_calls(&self) -> usize {
        self.lock().avi_subnet_calls
    }

    /// Paths passed to `delete_vpc`, failed attempts included
    pub fn deleted_paths(&self) -> Vec<String> {
        self.lock().deleted_paths.clone()
    }
}

#[async_trait::async_trait]
impl VpcGatewayTrait for MockVpcGateway {
    async fn create_or_update_vpc(
        &self,
        owner: &VpcOwner,
        config: &VpcNetworkConfigInfo,
        lb_provider: LbProvider,
    ) -> Result<Vpc, NsxError> {
        let mut state = self.lock();
        state.create_or_update_calls += 1;

        if let Some(message) = state.create_error.clone() {
            return Err(NsxError::Api(message));
        }

        if let Some(path) = config.vpc_path.as_deref().filter(|p| !p.is_empty()) {
            return state
                .external_vpcs
                .get(path)
                .cloned()
                .ok_or_else(|| NsxError::NotFound(path.to_string()));
        }

        let id = build_vpc_id(owner);
        let path = format!("{}/vpcs/{}", config.project_path(), id);
        let endpoint = state.lb_endpoint_override.clone().unwrap_or_else(|| {
            Some(LoadBalancerVpcEndpoint {
                enabled: Some(lb_provider == LbProvider::Avi),
            })
        });
        let vpc = Vpc {
            id,
            path: path.clone(),
            display_name: owner.namespace.clone(),
            private_ips: config.private_ips.clone(),
            tags: build_owner_tags(MOCK_CLUSTER, owner),
            load_balancer_vpc_endpoint: endpoint,
            short_id: None,
        };
        state.managed_vpcs.insert(path, vpc.clone());
        Ok(vpc)
    }

    async fn delete_vpc(&self, path: &str) -> Result<(), NsxError> {
        let mut state = self.lock();
        state.deleted_paths.push(path.to_string());
        if state.failing_deletes.contains(path) {
            return Err(NsxError::Api(format!("failed to delete {}", path)));
        }
        state.managed_vpcs.remove(path);
        Ok(())
    }

    fn list_vpc(&self) -> Vec<Vpc> {
        self.lock().managed_vpcs.values().cloned().collect()
    }

    fn get_vpcs_by_namespace(&self, ns: &str) -> Vec<Vpc> {
        self.lock()
            .managed_vpcs
            .values()
            .filter(|v| v.namespace() == Some(ns))
            .cloned()
            .collect()
    }

    async fn list_vpc_attachments(&self, vpc_path: &str) -> Result<Vec<VpcAttachment>, NsxError> {
        Ok(self
            .lock()
            .attachments
            .get(vpc_path)
            .cloned()
            .unwrap_or_default())
    }

    async fn validate_gateway_connection_status(
        &self,
        _config: &VpcNetworkConfigInfo,
    ) -> Result<(bool, String), NsxError> {
        let mut state = self.lock();
        state.validate_gateway_calls += 1;
        Ok(state.gateway_status.clone())
    }

    async fn get_vpc_connectivity_profile(
        &self,
        _config: &VpcNetworkConfigInfo,
        profile_path: &str,
    ) -> Result<VpcConnectivityProfile, NsxError> {
        self.lock()
            .profiles
            .get(profile_path)
            .cloned()
            .ok_or_else(|| NsxError::NotFound(profile_path.to_string()))
    }

    async fn get_default_snat_ip(&self, vpc: &Vpc) -> Result<String, NsxError> {
        self.lock()
            .snat_ips
            .get(&vpc.path)
            .cloned()
            .ok_or_else(|| NsxError::NotFound(format!("default SNAT rule in VPC {}", vpc.path)))
    }

    async fn get_avi_subnet_info(&self, vpc: &Vpc) -> Result<(String, String), NsxError> {
        let mut state = self.lock();
        state.avi_subnet_calls += 1;
        state
            .avi_subnets
            .get(&vpc.path)
            .cloned()
            .ok_or_else(|| NsxError::NotFound(format!("AVI subnet in VPC {}", vpc.path)))
    }

    async fn get_lbs_path_by_vpc(&self, vpc_path: &str) -> Result<String, NsxError> {
        Ok(self
            .lock()
            .lbs_paths
            .get(vpc_path)
            .cloned()
            .unwrap_or_default())
    }

    fn get_default_nsx_lbs_path_by_vpc(&self, vpc: &Vpc) -> String {
        format!("{}/vpc-lbs/{}", vpc.path, DEFAULT_LBS_ID)
    }

    fn is_enable_auto_snat(&self, profile: &VpcConnectivityProfile) -> bool {
        is_auto_snat_enabled(profile)
    }

    fn get_lb_provider(&self) -> LbProvider {
        self.lock().lb_provider
    }

    async fn is_shared_vpc_namespace_by_ns(&self, ns: &str) -> Result<bool, NsxError> {
        Ok(self.lock().shared_namespaces.contains_key(ns))
    }

    fn register_shared_namespace(&self, ns: &str, owner_ns: Option<&str>) {
        let mut state = self.lock();
        match owner_ns.filter(|o| !o.is_empty() && *o != ns) {
            Some(owner) => {
                state
                    .shared_namespaces
                    .insert(ns.to_string(), owner.to_string());
            }
            None => {
                state.shared_namespaces.remove(ns);
            }
        }
    }

    async fn get_all_vpcs_from_nsx(&self) -> Result<HashMap<String, Vpc>, NsxError> {
        let state = self.lock();
        if let Some(message) = state.list_all_error.clone() {
            return Err(NsxError::Api(message));
        }
        Ok(state
            .managed_vpcs
            .iter()
            .chain(state.external_vpcs.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
