//! Fixed requeue intervals.
//!
//! A transient step failure comes back after 10s and a pass blocked on the
//! system configuration after 60s. Pre-created VPC drift is polled every 10
//! minutes.

use crate::error::ControllerError;
use kube_runtime::controller::Action;
use std::time::Duration;

/// Transient per-step failure
pub const REQUEUE_TRANSIENT: Duration = Duration::from_secs(10);
/// Pass gated on the system configuration
pub const REQUEUE_SYSTEM_GATE: Duration = Duration::from_secs(60);
/// Period of the pre-created VPC drift check
pub const DRIFT_CHECK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Action for a pass blocked by the system configuration
pub fn system_gate() -> Action {
    Action::requeue(REQUEUE_SYSTEM_GATE)
}

/// Action the error policy returns for any failed pass
pub fn for_error(_error: &ControllerError) -> Action {
    Action::requeue(REQUEUE_TRANSIENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_requeues_after_transient_delay() {
        let errors = [
            ControllerError::ConfigNotFound("ns".to_string()),
            ControllerError::Topology("no LB".to_string()),
            ControllerError::Nsx(nsx_client::NsxError::Api("boom".to_string())),
        ];
        for error in &errors {
            assert_eq!(for_error(error), Action::requeue(Duration::from_secs(10)));
        }
    }

    #[test]
    fn test_system_gate_is_sixty_seconds() {
        assert_eq!(system_gate(), Action::requeue(Duration::from_secs(60)));
        assert_eq!(DRIFT_CHECK_INTERVAL, Duration::from_secs(600));
    }
}
