//! Reconciliation logic for NetworkInfo and its supporting loops.
//!
//! This module is organized by concern:
//! - `network_info`: the per-namespace VPC realization pass
//! - `topology`: VPC topology and load balancer resolution
//! - `deletion`: VPC teardown for deleted NetworkInfo objects
//! - `gc`: periodic orphan VPC collection
//! - `drift`: periodic pre-created VPC drift detection
//! - `config_handler` / `namespace_handler`: watch event handlers feeding the registry

pub mod config_handler;
pub mod deletion;
pub mod drift;
pub mod gc;
pub mod namespace_handler;
pub mod network_info;
mod topology;

use crate::cluster::ClusterClientTrait;
use crate::events::EventPublisher;
use crate::metrics::Metrics;
use crate::registry::NetworkConfigRegistry;
use crate::status::StatusProjector;
use crds::NetworkInfo;
use kube_runtime::reflector::ObjectRef;
use nsx_client::VpcGatewayTrait;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

/// Re-enqueue handle for NetworkInfo reconciliation.
///
/// The receiving side is fed to the controller runtime, which deduplicates
/// keys already scheduled.
#[derive(Debug, Clone)]
pub struct NetworkInfoQueue {
    sender: UnboundedSender<ObjectRef<NetworkInfo>>,
}

impl NetworkInfoQueue {
    pub fn new() -> (Self, UnboundedReceiver<ObjectRef<NetworkInfo>>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Schedule a reconciliation of `namespace/name`. Returns false once the
    /// controller has shut down.
    pub fn enqueue(&self, namespace: &str, name: &str) -> bool {
        debug!("Enqueueing NetworkInfo {}/{}", namespace, name);
        let key = ObjectRef::new(name).within(namespace);
        if self.sender.send(key).is_err() {
            warn!("Reconcile queue closed, dropping NetworkInfo {}/{}", namespace, name);
            return false;
        }
        true
    }
}

/// Reconciles NetworkInfo objects against NSX.
pub struct Reconciler {
    pub(crate) gateway: Arc<dyn VpcGatewayTrait>,
    pub(crate) cluster: Arc<dyn ClusterClientTrait>,
    pub(crate) registry: Arc<NetworkConfigRegistry>,
    pub(crate) status: StatusProjector,
    pub(crate) events: Arc<dyn EventPublisher>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) queue: NetworkInfoQueue,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        gateway: Arc<dyn VpcGatewayTrait>,
        cluster: Arc<dyn ClusterClientTrait>,
        registry: Arc<NetworkConfigRegistry>,
        events: Arc<dyn EventPublisher>,
        metrics: Arc<Metrics>,
        queue: NetworkInfoQueue,
    ) -> Self {
        Self {
            gateway,
            status: StatusProjector::new(Arc::clone(&cluster)),
            cluster,
            registry,
            events,
            metrics,
            queue,
        }
    }

    /// Enqueue every NetworkInfo in `namespace`. Returns how many were enqueued.
    pub(crate) async fn enqueue_namespace(&self, namespace: &str) -> usize {
        let network_infos = match self.cluster.list_network_infos(Some(namespace)).await {
            Ok(list) => list,
            Err(e) => {
                warn!("Failed to list NetworkInfos in namespace {}: {}", namespace, e);
                return 0;
            }
        };
        network_infos
            .iter()
            .filter_map(|ni| ni.metadata.name.as_deref())
            .filter(|name| self.queue.enqueue(namespace, name))
            .count()
    }
}
