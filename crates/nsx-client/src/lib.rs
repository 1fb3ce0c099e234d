//! NSX Policy API Client
//!
//! A Rust client library for the NSX Policy API, scoped to VPC topology.
//! Provides typed models, a paginating HTTP layer and `VpcService`, the
//! gateway the NetworkInfo controller provisions VPCs through.
//!
//! # Example
//!
//! ```no_run
//! use nsx_client::{LbProvider, NsxClient, VpcGatewayTrait, VpcService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = NsxClient::new(
//!     "https://nsx-manager:443".to_string(),
//!     "admin".to_string(),
//!     "password".to_string(),
//!     false,
//! )?;
//!
//! let service = VpcService::new(client, "cluster-a".to_string(), LbProvider::NsxLb);
//! service.initialize().await?;
//!
//! for vpc in service.get_vpcs_by_namespace("team-a") {
//!     println!("{} -> {}", vpc.display_name, vpc.path);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod models;
pub mod store;
pub mod vpc;
#[path = "trait.rs"]
pub mod gateway_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::NsxClient;
pub use common::HttpClient;
pub use error::NsxError;
pub use gateway_trait::VpcGatewayTrait;
pub use models::*;
pub use store::VpcStore;
pub use vpc::VpcService;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockVpcGateway;
