//! NSX VPC CRD Definitions
//!
//! Kubernetes Custom Resource Definitions consumed and written by the
//! NetworkInfo controller.

pub mod condition;
pub mod network_info;
pub mod vpc_network_configuration;

pub use condition::*;
pub use network_info::*;
pub use vpc_network_configuration::*;
