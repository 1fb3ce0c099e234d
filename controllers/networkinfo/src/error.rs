//! Controller-specific error types.
//!
//! Every reconciliation failure surfaces as a `ControllerError`; the
//! runtime's error policy turns any of them into the fixed transient requeue.

use kube::Error as KubeError;
use nsx_client::NsxError;
use thiserror::Error;

/// Errors that can occur in the NetworkInfo Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error (404s never reach here, they are mapped to `None`)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// NSX API error
    #[error("NSX error: {0}")]
    Nsx(#[from] NsxError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No VPCNetworkConfiguration governs the namespace
    #[error("VPC network configuration not found: {0}")]
    ConfigNotFound(String),

    /// VPC topology could not be resolved (missing attachment, missing LB, ...)
    #[error("VPC topology error: {0}")]
    Topology(String),

    /// One or more VPC deletions failed
    #[error("VPC deletion failed: {0}")]
    VpcDeletion(AggregateError),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Several independent failures reported as one error
#[derive(Debug, Default)]
pub struct AggregateError {
    errors: Vec<String>,
}

impl AggregateError {
    pub fn push(&mut self, error: impl std::fmt::Display) {
        self.errors.push(error.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), ControllerError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ControllerError::VpcDeletion(self))
        }
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error(s): [{}]", self.errors.len(), self.errors.join("; "))
    }
}

impl std::error::Error for AggregateError {}

/// True when the Kubernetes error is a 404
pub fn is_not_found(error: &KubeError) -> bool {
    matches!(error, KubeError::Api(response) if response.code == 404)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_error_collects_all() {
        let mut errors = AggregateError::default();
        assert!(errors.is_empty());
        errors.push("vpc-a: timeout");
        errors.push(NsxError::Api("vpc-b: conflict".to_string()));
        assert_eq!(errors.len(), 2);

        let err = errors.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("2 error(s)"));
        assert!(message.contains("vpc-a: timeout"));
        assert!(message.contains("vpc-b: conflict"));
    }

    #[test]
    fn test_empty_aggregate_is_ok() {
        assert!(AggregateError::default().into_result().is_ok());
    }
}
