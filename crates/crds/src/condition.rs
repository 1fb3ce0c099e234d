//! Shared status condition record
//!
//! Used by both NetworkInfo and VPCNetworkConfiguration status. Mirrors the
//! shape of Kubernetes `metav1.Condition` so the same record can be written to
//! a Namespace's `status.conditions`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status value for a true condition
pub const CONDITION_TRUE: &str = "True";
/// Condition status value for a false condition
pub const CONDITION_FALSE: &str = "False";
/// Condition status value when the outcome is not known yet
pub const CONDITION_UNKNOWN: &str = "Unknown";

/// Condition type on NetworkInfo status and on Namespaces
pub const CONDITION_READY: &str = "Ready";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (merge key)
    #[serde(rename = "type")]
    pub r#type: String,

    /// "True", "False" or "Unknown"
    pub status: String,

    /// Machine-readable reason code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl Condition {
    /// Build a condition with the given status and no timestamp.
    ///
    /// The timestamp is stamped by the status merge when the condition
    /// actually changes.
    pub fn new(
        r#type: impl Into<String>,
        status: &str,
        reason: Option<&str>,
        message: Option<String>,
    ) -> Self {
        Self {
            r#type: r#type.into(),
            status: status.to_string(),
            reason: reason.filter(|r| !r.is_empty()).map(str::to_string),
            message: message.filter(|m| !m.is_empty()),
            last_transition_time: None,
        }
    }

    /// Build a `True` condition
    pub fn ready(r#type: impl Into<String>, message: Option<String>) -> Self {
        Self::new(r#type, CONDITION_TRUE, None, message)
    }

    /// Build a `False` condition with a reason code
    pub fn not_ready(r#type: impl Into<String>, reason: &str, message: impl Into<String>) -> Self {
        Self::new(r#type, CONDITION_FALSE, Some(reason), Some(message.into()))
    }

    /// True when `status` is "True"
    pub fn is_true(&self) -> bool {
        self.status == CONDITION_TRUE
    }

    /// True when `status` is "False"
    pub fn is_false(&self) -> bool {
        self.status == CONDITION_FALSE
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}
