//! NSX Policy API client
//!
//! Typed calls for the VPC resources the controller touches. Paths follow
//! the multi-tenancy layout `/orgs/{org}/projects/{project}/vpcs/{vpc}`.

use crate::common::{HttpClient, query};
use crate::error::NsxError;
use crate::models::*;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// NSX Policy API client
#[derive(Debug, Clone)]
pub struct NsxClient {
    http: HttpClient,
}

impl NsxClient {
    /// Create a new NSX client
    ///
    /// # Arguments
    /// * `base_url` - NSX manager URL (e.g., "https://nsx-manager:443")
    /// * `username` / `password` - basic-auth credentials
    /// * `insecure` - skip TLS certificate verification (lab setups)
    pub fn new(
        base_url: String,
        username: String,
        password: String,
        insecure: bool,
    ) -> Result<Self, NsxError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(insecure)
            .build()?;

        Ok(Self {
            http: HttpClient::new(client, base_url, username, password),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Check connectivity and credentials against the node endpoint
    pub async fn validate_credentials(&self) -> Result<(), NsxError> {
        debug!("Validating NSX credentials and connectivity");
        let _: serde_json::Value = self.http.get("/policy/api/v1/infra").await?;
        Ok(())
    }

    // VPC operations

    pub async fn get_vpc(&self, vpc_path: &str) -> Result<Vpc, NsxError> {
        self.http.get(vpc_path).await
    }

    pub async fn patch_vpc(&self, vpc_path: &str, vpc: &Vpc) -> Result<(), NsxError> {
        self.http.patch(vpc_path, &serde_json::to_value(vpc)?).await
    }

    pub async fn delete_vpc(&self, vpc_path: &str) -> Result<(), NsxError> {
        self.http
            .delete(&format!("{}?is_recursive=true", vpc_path))
            .await
    }

    /// Every VPC visible to the credentials, tagged or not
    pub async fn search_vpcs(&self) -> Result<Vec<Vpc>, NsxError> {
        query::search_resources(&self.http, "Vpc", &[]).await
    }

    /// VPCs carrying the given cluster tag
    pub async fn search_cluster_vpcs(&self, cluster: &str) -> Result<Vec<Vpc>, NsxError> {
        query::search_resources(&self.http, "Vpc", &[(TAG_SCOPE_CLUSTER, cluster)]).await
    }

    pub async fn list_vpc_attachments(&self, vpc_path: &str) -> Result<Vec<VpcAttachment>, NsxError> {
        self.http
            .fetch_all_pages(&format!("{}/attachments", vpc_path))
            .await
    }

    pub async fn patch_vpc_attachment(
        &self,
        vpc_path: &str,
        attachment: &VpcAttachment,
    ) -> Result<(), NsxError> {
        self.http
            .patch(
                &format!("{}/attachments/{}", vpc_path, attachment.id),
                &serde_json::to_value(attachment)?,
            )
            .await
    }

    // Connectivity

    pub async fn get_vpc_connectivity_profile(
        &self,
        profile_path: &str,
    ) -> Result<VpcConnectivityProfile, NsxError> {
        self.http.get(profile_path).await
    }

    pub async fn get_project(&self, project_path: &str) -> Result<Project, NsxError> {
        self.http.get(project_path).await
    }

    pub async fn list_transit_gateway_attachments(
        &self,
        project_path: &str,
    ) -> Result<Vec<TransitGatewayAttachment>, NsxError> {
        self.http
            .fetch_all_pages(&format!("{}/transit-gateways/default/attachments", project_path))
            .await
    }

    // Services under a VPC

    pub async fn list_nat_rules(&self, vpc_path: &str) -> Result<Vec<NatRule>, NsxError> {
        self.http
            .fetch_all_pages(&format!("{}/nat/USER/nat-rules", vpc_path))
            .await
    }

    pub async fn list_lb_services(&self, vpc_path: &str) -> Result<Vec<LbService>, NsxError> {
        self.http
            .fetch_all_pages(&format!("{}/vpc-lbs", vpc_path))
            .await
    }

    pub async fn patch_lb_service(&self, vpc_path: &str, lbs: &LbService) -> Result<(), NsxError> {
        self.http
            .patch(
                &format!("{}/vpc-lbs/{}", vpc_path, lbs.id),
                &serde_json::to_value(lbs)?,
            )
            .await
    }

    pub async fn get_subnet(&self, vpc_path: &str, subnet_id: &str) -> Result<Subnet, NsxError> {
        self.http
            .get(&format!("{}/subnets/{}", vpc_path, subnet_id))
            .await
    }
}
