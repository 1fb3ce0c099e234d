//! Test utilities for unit testing reconcilers
//!
//! This module provides an in-memory cluster client, a recording event
//! publisher and builders for test objects.

use crate::cluster::ClusterClientTrait;
use crate::error::ControllerError;
use crate::events::EventPublisher;
use crate::metrics::Metrics;
use crate::reconciler::{NetworkInfoQueue, Reconciler};
use crate::registry::NetworkConfigRegistry;
use crds::*;
use k8s_openapi::api::core::v1::{Namespace, NamespaceCondition, NamespaceStatus, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube_runtime::events::EventType;
use kube_runtime::reflector::ObjectRef;
use nsx_client::{
    LbProvider, MockVpcGateway, Tag, TAG_SCOPE_CLUSTER, TAG_SCOPE_NAMESPACE, TAG_SCOPE_NAMESPACE_UID,
    TAG_SCOPE_VPC_CR_UID, Vpc, VpcConnectivityProfile, VpcNetworkConfigInfo,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;

pub const TEST_PROJECT_PATH: &str = "/orgs/default/projects/proj-1";
pub const TEST_PROFILE_PATH: &str = "/orgs/default/projects/proj-1/vpc-connectivity-profiles/default";

#[derive(Debug, Default)]
struct ClusterState {
    network_infos: BTreeMap<(String, String), NetworkInfo>,
    configs: BTreeMap<String, VPCNetworkConfiguration>,
    namespaces: BTreeMap<String, Namespace>,
    failing_network_info_lists: HashSet<String>,
    fail_namespace_list: bool,
    vpc_state_writes: usize,
    network_info_status_writes: usize,
    config_status_writes: usize,
    namespace_condition_writes: usize,
}

/// In-memory `ClusterClientTrait`
///
/// Cloning shares state.
#[derive(Debug, Clone, Default)]
pub struct MockClusterClient {
    state: Arc<Mutex<ClusterState>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_network_info(&self, ni: NetworkInfo) {
        let key = (
            ni.metadata.namespace.clone().unwrap_or_default(),
            ni.metadata.name.clone().unwrap_or_default(),
        );
        self.lock().network_infos.insert(key, ni);
    }

    pub fn remove_network_info(&self, namespace: &str, name: &str) {
        self.lock()
            .network_infos
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn add_config(&self, config: VPCNetworkConfiguration) {
        let name = config.metadata.name.clone().unwrap_or_default();
        self.lock().configs.insert(name, config);
    }

    pub fn add_namespace(&self, ns: Namespace) {
        let name = ns.metadata.name.clone().unwrap_or_default();
        self.lock().namespaces.insert(name, ns);
    }

    pub fn remove_namespace(&self, name: &str) {
        self.lock().namespaces.remove(name);
    }

    /// Make `list_network_infos(Some(namespace))` fail
    pub fn fail_network_info_list(&self, namespace: &str) {
        self.lock()
            .failing_network_info_lists
            .insert(namespace.to_string());
    }

    pub fn fail_namespace_list(&self) {
        self.lock().fail_namespace_list = true;
    }

    pub fn network_info(&self, namespace: &str, name: &str) -> Option<NetworkInfo> {
        self.lock()
            .network_infos
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn config(&self, name: &str) -> Option<VPCNetworkConfiguration> {
        self.lock().configs.get(name).cloned()
    }

    pub fn config_condition(&self, config: &str, r#type: &str) -> Option<Condition> {
        self.config(config)
            .and_then(|c| c.status)
            .and_then(|s| find_condition(&s.conditions, r#type).cloned())
    }

    /// The namespace readiness condition
    pub fn namespace_condition(&self, name: &str) -> Option<NamespaceCondition> {
        self.lock()
            .namespaces
            .get(name)
            .and_then(|ns| ns.status.as_ref())
            .and_then(|s| s.conditions.as_ref())
            .and_then(|c| c.first().cloned())
    }

    pub fn vpc_state_writes(&self) -> usize {
        self.lock().vpc_state_writes
    }

    pub fn network_info_status_writes(&self) -> usize {
        self.lock().network_info_status_writes
    }

    pub fn config_status_writes(&self) -> usize {
        self.lock().config_status_writes
    }

    pub fn namespace_condition_writes(&self) -> usize {
        self.lock().namespace_condition_writes
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_network_info(&self, namespace: &str, name: &str) -> Result<Option<NetworkInfo>, ControllerError> {
        Ok(self.network_info(namespace, name))
    }

    async fn list_network_infos(&self, namespace: Option<&str>) -> Result<Vec<NetworkInfo>, ControllerError> {
        let state = self.lock();
        if let Some(ns) = namespace {
            if state.failing_network_info_lists.contains(ns) {
                return Err(ControllerError::Watch(format!("list NetworkInfos in {} failed", ns)));
            }
        }
        Ok(state
            .network_infos
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|want| want == ns))
            .map(|(_, ni)| ni.clone())
            .collect())
    }

    async fn update_network_info_vpcs(&self, namespace: &str, name: &str, vpcs: &[VPCState]) -> Result<(), ControllerError> {
        let mut state = self.lock();
        state.vpc_state_writes += 1;
        if let Some(ni) = state
            .network_infos
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            ni.spec.vpcs = vpcs.to_vec();
        }
        Ok(())
    }

    async fn update_network_info_status(&self, namespace: &str, name: &str, status: &NetworkInfoStatus) -> Result<(), ControllerError> {
        let mut state = self.lock();
        state.network_info_status_writes += 1;
        if let Some(ni) = state
            .network_infos
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            ni.status = Some(status.clone());
        }
        Ok(())
    }

    async fn get_vpc_network_configuration(&self, name: &str) -> Result<Option<VPCNetworkConfiguration>, ControllerError> {
        Ok(self.config(name))
    }

    async fn list_vpc_network_configurations(&self) -> Result<Vec<VPCNetworkConfiguration>, ControllerError> {
        Ok(self.lock().configs.values().cloned().collect())
    }

    async fn update_vpc_network_configuration_status(&self, name: &str, status: &VPCNetworkConfigurationStatus) -> Result<(), ControllerError> {
        let mut state = self.lock();
        state.config_status_writes += 1;
        if let Some(config) = state.configs.get_mut(name) {
            config.status = Some(status.clone());
        }
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, ControllerError> {
        Ok(self.lock().namespaces.get(name).cloned())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ControllerError> {
        let state = self.lock();
        if state.fail_namespace_list {
            return Err(ControllerError::Watch("list Namespaces failed".to_string()));
        }
        Ok(state.namespaces.values().cloned().collect())
    }

    async fn update_namespace_conditions(&self, name: &str, conditions: &[NamespaceCondition]) -> Result<(), ControllerError> {
        let mut state = self.lock();
        state.namespace_condition_writes += 1;
        if let Some(ns) = state.namespaces.get_mut(name) {
            ns.status.get_or_insert_with(NamespaceStatus::default).conditions = Some(conditions.to_vec());
        }
        Ok(())
    }
}

/// An event captured by `RecordingEventPublisher`
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub warning: bool,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

/// Event publisher that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                warning: matches!(type_, EventType::Warning),
                reason: reason.to_string(),
                action: action.to_string(),
                note,
            });
    }
}

/// A reconciler over mocks, with handles to inspect them
pub struct TestHarness {
    pub reconciler: Arc<Reconciler>,
    pub gateway: MockVpcGateway,
    pub cluster: MockClusterClient,
    pub registry: Arc<NetworkConfigRegistry>,
    pub events: Arc<RecordingEventPublisher>,
    pub metrics: Arc<Metrics>,
    pub requeues: UnboundedReceiver<ObjectRef<NetworkInfo>>,
}

impl TestHarness {
    pub fn new(lb_provider: LbProvider) -> Self {
        let gateway = MockVpcGateway::new(lb_provider);
        let cluster = MockClusterClient::new();
        let registry = Arc::new(NetworkConfigRegistry::new());
        let events = Arc::new(RecordingEventPublisher::default());
        let metrics = Arc::new(Metrics::new().unwrap());
        let (queue, requeues) = NetworkInfoQueue::new();
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(gateway.clone()),
            Arc::new(cluster.clone()),
            Arc::clone(&registry),
            events.clone(),
            Arc::clone(&metrics),
            queue,
        ));
        Self {
            reconciler,
            gateway,
            cluster,
            registry,
            events,
            metrics,
            requeues,
        }
    }

    /// Keys enqueued since the last drain
    pub fn drain_requeues(&mut self) -> Vec<ObjectRef<NetworkInfo>> {
        let mut keys = Vec::new();
        while let Ok(key) = self.requeues.try_recv() {
            keys.push(key);
        }
        keys
    }

    /// Store and register a configuration CR
    pub fn add_config(&self, config: VPCNetworkConfiguration) {
        let info = crate::registry::build_network_config_info(&config).unwrap();
        self.registry.register(&info.name.clone(), info);
        self.cluster.add_config(config);
    }

    /// Store a namespace with a NetworkInfo of the same name
    pub fn add_namespace_with_network_info(&self, namespace: &str) -> NetworkInfo {
        self.cluster
            .add_namespace(create_test_namespace(namespace, &format!("ns-uid-{}", namespace), &[]));
        let ni = create_test_network_info(namespace, namespace);
        self.cluster.add_network_info(ni.clone());
        ni
    }
}

/// Helper to create a test NetworkInfo
pub fn create_test_network_info(namespace: &str, name: &str) -> NetworkInfo {
    NetworkInfo {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("ni-uid-{}", name)),
            ..Default::default()
        },
        spec: NetworkInfoSpec::default(),
        status: None,
    }
}

/// Helper to create a test Namespace with annotations
pub fn create_test_namespace(name: &str, uid: &str, annotations: &[(&str, &str)]) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            uid: Some(uid.to_string()),
            annotations: (!annotations.is_empty()).then(|| {
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Helper to create a test VPCNetworkConfiguration.
///
/// `vpc` makes it a pre-created VPC configuration.
pub fn create_test_config(name: &str, is_default: bool, vpc: Option<&str>) -> VPCNetworkConfiguration {
    let annotations = is_default.then(|| {
        BTreeMap::from([(ANNOTATION_DEFAULT_NETWORK_CONFIG.to_string(), "true".to_string())])
    });
    VPCNetworkConfiguration {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            uid: Some(format!("uid-{}", name)),
            annotations,
            ..Default::default()
        },
        spec: VPCNetworkConfigurationSpec {
            vpc: vpc.map(str::to_string),
            nsx_project: TEST_PROJECT_PATH.to_string(),
            vpc_connectivity_profile: TEST_PROFILE_PATH.to_string(),
            private_ips: vec!["172.26.0.0/16".to_string()],
            default_subnet_size: 32,
        },
        status: None,
    }
}

/// Set a condition on a configuration CR's status
pub fn with_condition(mut config: VPCNetworkConfiguration, condition: Condition) -> VPCNetworkConfiguration {
    config
        .status
        .get_or_insert_with(VPCNetworkConfigurationStatus::default)
        .conditions
        .push(condition);
    config
}

/// Registry record for an operator-managed VPC configuration
pub fn test_config_info(name: &str, is_default: bool) -> VpcNetworkConfigInfo {
    VpcNetworkConfigInfo {
        name: name.to_string(),
        org: "default".to_string(),
        nsx_project: "proj-1".to_string(),
        vpc_connectivity_profile: TEST_PROFILE_PATH.to_string(),
        vpc_path: None,
        private_ips: vec!["172.26.0.0/16".to_string()],
        default_subnet_size: 32,
        is_default,
        short_id: None,
    }
}

/// Registry record for a pre-created VPC configuration
pub fn test_pre_created_config_info(name: &str, vpc_path: &str) -> VpcNetworkConfigInfo {
    VpcNetworkConfigInfo {
        vpc_path: Some(vpc_path.to_string()),
        private_ips: Vec::new(),
        ..test_config_info(name, false)
    }
}

/// Connectivity profile with external IP blocks and auto SNAT as given
pub fn test_profile(path: &str, external_ip_blocks: bool, auto_snat: bool) -> VpcConnectivityProfile {
    serde_json::from_value(serde_json::json!({
        "id": "default",
        "path": path,
        "external_ip_blocks": if external_ip_blocks { vec!["/infra/ip-blocks/external"] } else { vec![] },
        "service_gateway": {
            "enable": true,
            "nat_config": { "enable_default_snat": auto_snat }
        }
    }))
    .unwrap()
}

/// Operator-managed VPC tagged for `namespace`
pub fn test_managed_vpc(namespace: &str, namespace_uid: &str, cr_uid: &str) -> Vpc {
    Vpc {
        id: format!("{}-vpc", namespace),
        path: format!("{}/vpcs/{}-vpc", TEST_PROJECT_PATH, namespace),
        display_name: namespace.to_string(),
        private_ips: vec!["172.26.0.0/16".to_string()],
        tags: vec![
            Tag::new(TAG_SCOPE_CLUSTER, "mock-cluster"),
            Tag::new(TAG_SCOPE_NAMESPACE, namespace),
            Tag::new(TAG_SCOPE_NAMESPACE_UID, namespace_uid),
            Tag::new(TAG_SCOPE_VPC_CR_UID, cr_uid),
        ],
        ..Default::default()
    }
}
