//! NetworkInfo reconciler
//!
//! One pass resolves the namespace's configuration, checks the system
//! gateway gate, provisions the VPC, resolves its topology, SNAT and load
//! balancer, then publishes the result on every status surface.

use super::Reconciler;
use super::topology::LoadBalancer;
use crate::conditions::{
    NamespaceReadyReason, is_condition_false, is_condition_true, namespace_not_ready,
    namespace_ready,
};
use crate::error::ControllerError;
use crate::events::{actions, reasons};
use crate::metrics::{RESULT_FAILURE, RESULT_SUCCESS};
use crate::requeue;
use crds::{
    CONDITION_AUTO_SNAT_ENABLED, CONDITION_EXTERNAL_IP_BLOCKS_CONFIGURED,
    CONDITION_GATEWAY_CONNECTION_READY, CONDITION_READY, Condition, NetworkInfo,
    SYSTEM_VPC_NETWORK_CONFIG_NAME, VPCInfo, VPCState,
};
use kube::Resource;
use kube_runtime::controller::Action;
use kube_runtime::events::EventType;
use nsx_client::{VpcNetworkConfigInfo, VpcOwner};
use tracing::{debug, error, info, warn};

const REASON_EXTERNAL_IP_BLOCKS_MISSING: &str = "ExternalIPBlocksNotConfigured";
const REASON_AUTO_SNAT_DISABLED: &str = "AutoSnatNotEnabled";

/// State carried across the steps of one pass
#[derive(Debug, Default)]
pub(crate) struct PassOutcome {
    /// Set when the system configuration is not usable. The pass still
    /// provisions its own VPC but ends not-ready with the system requeue.
    system_gate: Option<String>,
}

impl PassOutcome {
    /// Record a system-level gate; the first one wins
    pub(crate) fn gate_on_system(&mut self, message: impl Into<String>) {
        if self.system_gate.is_none() {
            self.system_gate = Some(message.into());
        }
    }

    pub(crate) fn system_gate(&self) -> Option<&str> {
        self.system_gate.as_deref()
    }
}

/// A failed step, with the Namespace reason and any VPC state known so far
#[derive(Debug)]
pub(crate) struct StepFailure {
    reason: NamespaceReadyReason,
    error: ControllerError,
    partial: Option<VPCState>,
}

trait StepResultExt<T> {
    fn step(self, reason: NamespaceReadyReason) -> Result<T, StepFailure>;
    fn step_with_state(self, reason: NamespaceReadyReason, partial: &VPCState) -> Result<T, StepFailure>;
}

impl<T, E: Into<ControllerError>> StepResultExt<T> for Result<T, E> {
    fn step(self, reason: NamespaceReadyReason) -> Result<T, StepFailure> {
        self.map_err(|e| StepFailure {
            reason,
            error: e.into(),
            partial: None,
        })
    }

    fn step_with_state(self, reason: NamespaceReadyReason, partial: &VPCState) -> Result<T, StepFailure> {
        self.map_err(|e| StepFailure {
            reason,
            error: e.into(),
            partial: Some(partial.clone()),
        })
    }
}

impl Reconciler {
    /// Reconcile the NetworkInfo `namespace/name`.
    ///
    /// Absent and terminating objects take the deletion path.
    pub async fn reconcile_network_info(&self, namespace: &str, name: &str) -> Result<Action, ControllerError> {
        let Some(network_info) = self.cluster.get_network_info(namespace, name).await? else {
            info!("NetworkInfo {}/{} not found, cleaning up namespace VPCs", namespace, name);
            return self.delete_vpcs_by_namespace(namespace).await;
        };

        if network_info.metadata.deletion_timestamp.is_some() {
            info!("NetworkInfo {}/{} is being deleted", namespace, name);
            return self.delete_vpcs_by_network_info(&network_info).await;
        }

        info!("Reconciling NetworkInfo {}/{}", namespace, name);
        let mut outcome = PassOutcome::default();
        match self.realize(&network_info, namespace, &mut outcome).await {
            Ok(action) => Ok(action),
            Err(failure) => Err(self.report_failure(&network_info, namespace, failure).await),
        }
    }

    async fn realize(
        &self,
        network_info: &NetworkInfo,
        namespace: &str,
        outcome: &mut PassOutcome,
    ) -> Result<Action, StepFailure> {
        // Configuration
        let config = self
            .registry
            .get_by_namespace(namespace)
            .ok_or_else(|| {
                ControllerError::ConfigNotFound(match self.registry.binding(namespace) {
                    Some(bound) => format!("VPCNetworkConfiguration {} bound to namespace {}", bound, namespace),
                    None => format!("no default VPCNetworkConfiguration for namespace {}", namespace),
                })
            })
            .step(NamespaceReadyReason::ConfigNotReady)?;
        let governs_system = config.name == SYSTEM_VPC_NETWORK_CONFIG_NAME;
        debug!(namespace, config = %config.name, "Resolved VPC network configuration");

        // System gateway gate
        if let Some(action) = self.check_system_gateway(namespace, &config, governs_system, outcome).await? {
            return Ok(action);
        }

        // VPC
        let owner = self.vpc_owner(network_info, namespace).await?;
        let lb_provider = self.gateway.get_lb_provider();
        let vpc = self
            .gateway
            .create_or_update_vpc(&owner, &config, lb_provider)
            .await
            .step(NamespaceReadyReason::VpcNotReady)?;
        info!(namespace, vpc = %vpc.path, "VPC realized");

        let topology = self
            .resolve_topology(&config, &vpc, lb_provider)
            .await
            .step(NamespaceReadyReason::VpcNotReady)?;

        let mut state = VPCState {
            name: if vpc.display_name.is_empty() {
                vpc.id.clone()
            } else {
                vpc.display_name.clone()
            },
            private_ips: topology.private_ips.clone(),
            ..Default::default()
        };

        // External IP blocks
        let profile = self
            .gateway
            .get_vpc_connectivity_profile(&config, &topology.profile_path)
            .await
            .step_with_state(NamespaceReadyReason::VpcNotReady, &state)?;
        if governs_system {
            let has_blocks = !profile.external_ip_blocks.is_empty();
            let condition = if has_blocks {
                Condition::ready(CONDITION_EXTERNAL_IP_BLOCKS_CONFIGURED, None)
            } else {
                Condition::not_ready(
                    CONDITION_EXTERNAL_IP_BLOCKS_CONFIGURED,
                    REASON_EXTERNAL_IP_BLOCKS_MISSING,
                    format!("connectivity profile {} has no external IP blocks", profile.path),
                )
            };
            self.status
                .set_config_condition(SYSTEM_VPC_NETWORK_CONFIG_NAME, condition)
                .await
                .step_with_state(NamespaceReadyReason::ConfigNotReady, &state)?;
            if !has_blocks {
                outcome.gate_on_system("system VPCNetworkConfiguration has no external IP blocks");
            }
        }

        // SNAT
        let auto_snat = self.gateway.is_enable_auto_snat(&profile);
        if auto_snat {
            state.default_snat_ip = self
                .gateway
                .get_default_snat_ip(&vpc)
                .await
                .step_with_state(NamespaceReadyReason::SnatNotReady, &state)?;
        }
        if governs_system {
            let condition = if auto_snat {
                Condition::ready(CONDITION_AUTO_SNAT_ENABLED, None)
            } else {
                Condition::not_ready(
                    CONDITION_AUTO_SNAT_ENABLED,
                    REASON_AUTO_SNAT_DISABLED,
                    format!("auto SNAT is not enabled on connectivity profile {}", profile.path),
                )
            };
            self.status
                .set_config_condition(SYSTEM_VPC_NETWORK_CONFIG_NAME, condition)
                .await
                .step_with_state(NamespaceReadyReason::ConfigNotReady, &state)?;
            if !auto_snat {
                outcome.gate_on_system("auto SNAT is not enabled on the system VPC");
            }
        }

        // AVI load balancer subnet. A null endpoint means disabled.
        let mut lb_subnet_path = String::new();
        if topology.load_balancer == LoadBalancer::Avi && vpc.is_lb_endpoint_enabled() {
            let (path, cidr) = self
                .gateway
                .get_avi_subnet_info(&vpc)
                .await
                .step_with_state(NamespaceReadyReason::VpcNotReady, &state)?;
            lb_subnet_path = path;
            state.load_balancer_ip_addresses = cidr;
        }

        // Publish
        let vpc_info = VPCInfo {
            name: state.name.clone(),
            lb_subnet_path,
            nsx_load_balancer_path: topology.load_balancer.nsx_lbs_path().to_string(),
            vpc_path: vpc.path.clone(),
        };
        let changed = self
            .status
            .update_network_info_state(network_info, state)
            .await
            .step(NamespaceReadyReason::VpcNotReady)?;
        let published = if config.is_pre_created() {
            // A pre-created configuration backs exactly one VPC
            self.status
                .overwrite_config_single_vpc_info(&config.name, vpc_info)
                .await
        } else {
            self.status.upsert_config_vpc_info(&config.name, vpc_info).await
        };
        published.step(NamespaceReadyReason::VpcNotReady)?;
        self.status
            .set_network_info_condition(network_info, Condition::ready(CONDITION_READY, None))
            .await
            .step(NamespaceReadyReason::VpcNotReady)?;

        self.metrics.record_reconcile(RESULT_SUCCESS);
        if changed {
            self.events
                .publish(
                    &network_info.object_ref(&()),
                    EventType::Normal,
                    reasons::VPC_READY,
                    actions::RECONCILE,
                    Some(format!("VPC {} is ready", vpc.path)),
                )
                .await;
        }

        // Done
        let (condition, action) = match outcome.system_gate() {
            Some(message) => {
                info!(namespace, "VPC realized but system configuration is not ready: {}", message);
                (
                    namespace_not_ready(NamespaceReadyReason::ConfigNotReady, message),
                    requeue::system_gate(),
                )
            }
            None => (namespace_ready(), Action::await_change()),
        };
        self.status
            .set_namespace_condition(namespace, condition)
            .await
            .step(NamespaceReadyReason::VpcNotReady)?;
        Ok(action)
    }

    /// Gate the pass on the system configuration's gateway connection.
    ///
    /// Returns the action to end the pass with when provisioning must not
    /// run at all.
    async fn check_system_gateway(
        &self,
        namespace: &str,
        config: &VpcNetworkConfigInfo,
        governs_system: bool,
        outcome: &mut PassOutcome,
    ) -> Result<Option<Action>, StepFailure> {
        let system_conditions = self
            .cluster
            .get_vpc_network_configuration(SYSTEM_VPC_NETWORK_CONFIG_NAME)
            .await
            .step(NamespaceReadyReason::ConfigNotReady)?
            .and_then(|c| c.status)
            .map(|s| s.conditions)
            .unwrap_or_default();

        if is_condition_true(&system_conditions, CONDITION_GATEWAY_CONNECTION_READY) {
            if !governs_system {
                if is_condition_false(&system_conditions, CONDITION_EXTERNAL_IP_BLOCKS_CONFIGURED) {
                    outcome.gate_on_system("system VPCNetworkConfiguration has no external IP blocks");
                }
                if is_condition_false(&system_conditions, CONDITION_AUTO_SNAT_ENABLED) {
                    outcome.gate_on_system("auto SNAT is not enabled on the system VPC");
                }
            }
            return Ok(None);
        }

        if !governs_system {
            info!(namespace, "System gateway connection not ready, skipping VPC provisioning");
            self.status
                .set_namespace_condition(
                    namespace,
                    namespace_not_ready(
                        NamespaceReadyReason::ConfigNotReady,
                        "system VPCNetworkConfiguration gateway connection is not ready",
                    ),
                )
                .await
                .step(NamespaceReadyReason::ConfigNotReady)?;
            return Ok(Some(requeue::system_gate()));
        }

        let (ready, reason) = self
            .gateway
            .validate_gateway_connection_status(config)
            .await
            .step(NamespaceReadyReason::ConfigNotReady)?;
        let condition = if ready {
            Condition::ready(CONDITION_GATEWAY_CONNECTION_READY, None)
        } else {
            Condition::not_ready(
                CONDITION_GATEWAY_CONNECTION_READY,
                &reason,
                "gateway connection is not ready",
            )
        };
        self.status
            .set_config_condition(SYSTEM_VPC_NETWORK_CONFIG_NAME, condition)
            .await
            .step(NamespaceReadyReason::ConfigNotReady)?;
        if ready {
            info!("System gateway connection validated");
        } else {
            warn!("System gateway connection is not ready: {}", reason);
            outcome.gate_on_system(format!("gateway connection is not ready: {}", reason));
        }
        Ok(None)
    }

    async fn vpc_owner(&self, network_info: &NetworkInfo, namespace: &str) -> Result<VpcOwner, StepFailure> {
        let namespace_uid = self
            .cluster
            .get_namespace(namespace)
            .await
            .step(NamespaceReadyReason::VpcNotReady)?
            .and_then(|ns| ns.metadata.uid)
            .ok_or_else(|| ControllerError::InvalidConfig(format!("namespace {} has no UID", namespace)))
            .step(NamespaceReadyReason::VpcNotReady)?;
        Ok(VpcOwner {
            namespace: namespace.to_string(),
            namespace_uid,
            name: network_info.metadata.name.clone().unwrap_or_default(),
            uid: network_info.metadata.uid.clone().unwrap_or_default(),
        })
    }

    /// Record a failed pass on every status surface and return its error.
    ///
    /// Status write failures here are logged; the step error is what the
    /// error policy requeues on.
    async fn report_failure(
        &self,
        network_info: &NetworkInfo,
        namespace: &str,
        failure: StepFailure,
    ) -> ControllerError {
        let StepFailure { reason, error, partial } = failure;
        let message = error.to_string();
        error!(namespace, reason = reason.as_str(), "NetworkInfo reconciliation failed: {}", message);

        if let Err(e) = self
            .status
            .set_namespace_condition(namespace, namespace_not_ready(reason, message.clone()))
            .await
        {
            warn!(namespace, "Failed to update Namespace condition: {}", e);
        }
        if let Some(state) = partial {
            if let Err(e) = self.status.update_network_info_state(network_info, state).await {
                warn!(namespace, "Failed to record partial VPC state: {}", e);
            }
        }
        if let Err(e) = self
            .status
            .set_network_info_condition(
                network_info,
                Condition::not_ready(CONDITION_READY, reason.as_str(), message.clone()),
            )
            .await
        {
            warn!(namespace, "Failed to update NetworkInfo status: {}", e);
        }

        self.metrics.record_reconcile(RESULT_FAILURE);
        self.events
            .publish(
                &network_info.object_ref(&()),
                EventType::Warning,
                reasons::VPC_FAILED,
                actions::RECONCILE,
                Some(message),
            )
            .await;
        error
    }
}

#[cfg(test)]
#[path = "network_info_test.rs"]
mod network_info_test;
