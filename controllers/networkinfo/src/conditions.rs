//! Condition merging shared by every status surface.
//!
//! NetworkInfo, VPCNetworkConfiguration and Namespace conditions all follow
//! one rule: conditions are keyed by type, a new condition replaces the
//! existing one only when type, status, reason or message differ, and the
//! transition time is stamped only on an actual change.

use chrono::{DateTime, SecondsFormat, Utc};
use crds::{CONDITION_FALSE, Condition};
use k8s_openapi::api::core::v1::NamespaceCondition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// Condition type written on Namespaces
pub const NAMESPACE_NETWORK_READY: &str = "NamespaceNetworkReady";

/// A condition record that can be merged by type
pub trait ConditionRecord: Clone {
    fn condition_type(&self) -> &str;
    fn status(&self) -> &str;
    fn reason(&self) -> Option<&str>;
    fn message(&self) -> Option<&str>;
    fn set_transition_time(&mut self, now: DateTime<Utc>);

    /// Same type, status, reason and message. Empty and missing strings are equal.
    fn same_as(&self, other: &Self) -> bool {
        self.condition_type() == other.condition_type()
            && self.status() == other.status()
            && self.reason().unwrap_or_default() == other.reason().unwrap_or_default()
            && self.message().unwrap_or_default() == other.message().unwrap_or_default()
    }
}

impl ConditionRecord for Condition {
    fn condition_type(&self) -> &str {
        &self.r#type
    }
    fn status(&self) -> &str {
        &self.status
    }
    fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
    fn set_transition_time(&mut self, now: DateTime<Utc>) {
        self.last_transition_time = Some(now);
    }
}

impl ConditionRecord for NamespaceCondition {
    fn condition_type(&self) -> &str {
        &self.type_
    }
    fn status(&self) -> &str {
        &self.status
    }
    fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
    fn set_transition_time(&mut self, now: DateTime<Utc>) {
        // Time's inner representation differs across k8s-openapi releases; its
        // wire form is always RFC 3339.
        let stamp = serde_json::Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true));
        self.last_transition_time = serde_json::from_value::<Time>(stamp).ok();
    }
}

/// Merge `new` into `conditions` by type.
///
/// Returns false, leaving the list untouched, when an identical condition
/// already exists.
pub fn merge_condition<C: ConditionRecord>(conditions: &mut Vec<C>, mut new: C) -> bool {
    match conditions
        .iter()
        .position(|c| c.condition_type() == new.condition_type())
    {
        Some(index) if conditions[index].same_as(&new) => false,
        Some(index) => {
            new.set_transition_time(Utc::now());
            conditions[index] = new;
            true
        }
        None => {
            new.set_transition_time(Utc::now());
            conditions.push(new);
            true
        }
    }
}

/// Reason codes of the Namespace readiness condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceReadyReason {
    /// The governing (or system) configuration is not usable
    ConfigNotReady,
    /// The VPC could not be provisioned or resolved
    VpcNotReady,
    /// The VPC's SNAT is not available
    SnatNotReady,
}

impl NamespaceReadyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            NamespaceReadyReason::ConfigNotReady => "VPCNetworkConfigurationNotReady",
            NamespaceReadyReason::VpcNotReady => "VPCNotReady",
            NamespaceReadyReason::SnatNotReady => "VPCSnatNotReady",
        }
    }
}

/// Ready Namespace condition (empty reason)
pub fn namespace_ready() -> NamespaceCondition {
    NamespaceCondition {
        type_: NAMESPACE_NETWORK_READY.to_string(),
        status: crds::CONDITION_TRUE.to_string(),
        ..Default::default()
    }
}

/// Not-ready Namespace condition
pub fn namespace_not_ready(reason: NamespaceReadyReason, message: impl Into<String>) -> NamespaceCondition {
    NamespaceCondition {
        type_: NAMESPACE_NETWORK_READY.to_string(),
        status: CONDITION_FALSE.to_string(),
        reason: Some(reason.as_str().to_string()),
        message: Some(message.into()),
        last_transition_time: None,
    }
}

/// Read a configuration status condition as a readiness flag.
///
/// Missing conditions count as not ready.
pub fn is_condition_true(conditions: &[Condition], r#type: &str) -> bool {
    crds::find_condition(conditions, r#type).is_some_and(Condition::is_true)
}

/// True only when the condition is present and explicitly `False`
pub fn is_condition_false(conditions: &[Condition], r#type: &str) -> bool {
    crds::find_condition(conditions, r#type).is_some_and(Condition::is_false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::CONDITION_READY;

    #[test]
    fn test_identical_condition_is_noop() {
        let mut conditions = vec![];
        assert!(merge_condition(
            &mut conditions,
            Condition::not_ready(CONDITION_READY, "VPCNotReady", "boom")
        ));
        let stamped = conditions[0].last_transition_time;
        assert!(stamped.is_some());

        assert!(!merge_condition(
            &mut conditions,
            Condition::not_ready(CONDITION_READY, "VPCNotReady", "boom")
        ));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].last_transition_time, stamped);
    }

    #[test]
    fn test_changed_message_replaces_by_type() {
        let mut conditions = vec![Condition::not_ready(CONDITION_READY, "VPCNotReady", "first")];
        assert!(merge_condition(
            &mut conditions,
            Condition::not_ready(CONDITION_READY, "VPCNotReady", "second")
        ));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message.as_deref(), Some("second"));
    }

    #[test]
    fn test_different_types_are_kept_side_by_side() {
        let mut conditions = vec![];
        merge_condition(&mut conditions, Condition::ready("GatewayConnectionReady", None));
        merge_condition(&mut conditions, Condition::ready("AutoSnatEnabled", None));
        merge_condition(&mut conditions, Condition::ready("GatewayConnectionReady", None));
        assert_eq!(conditions.len(), 2);
    }

    #[test]
    fn test_namespace_condition_merge_ignores_timestamp() {
        let mut conditions = vec![namespace_ready()];
        conditions[0].set_transition_time(Utc::now());
        assert!(conditions[0].last_transition_time.is_some());

        assert!(!merge_condition(&mut conditions, namespace_ready()));
        assert!(merge_condition(
            &mut conditions,
            namespace_not_ready(NamespaceReadyReason::ConfigNotReady, "gateway not ready")
        ));
        assert_eq!(
            conditions[0].reason.as_deref(),
            Some("VPCNetworkConfigurationNotReady")
        );
        assert!(conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_empty_reason_equals_missing_reason() {
        let a = Condition::new(CONDITION_READY, "True", Some(""), None);
        let b = Condition {
            reason: Some(String::new()),
            ..Condition::ready(CONDITION_READY, None)
        };
        assert!(a.same_as(&b));
    }

    #[test]
    fn test_condition_flags() {
        let conditions = vec![
            Condition::ready("GatewayConnectionReady", None),
            Condition::not_ready("AutoSnatEnabled", "AutoSnatNotEnabled", "off"),
        ];
        assert!(is_condition_true(&conditions, "GatewayConnectionReady"));
        assert!(!is_condition_true(&conditions, "ExternalIPBlocksConfigured"));
        assert!(is_condition_false(&conditions, "AutoSnatEnabled"));
        assert!(!is_condition_false(&conditions, "ExternalIPBlocksConfigured"));
    }
}
