//! Integration tests for the NSX client
//!
//! These tests require a reachable NSX manager.
//! Set NSX_MANAGER_URL, NSX_USERNAME and NSX_PASSWORD to run.

use nsx_client::{LbProvider, NsxClient, VpcGatewayTrait, VpcService};

fn client_from_env() -> NsxClient {
    let url = std::env::var("NSX_MANAGER_URL")
        .unwrap_or_else(|_| "https://localhost:443".to_string());
    let username = std::env::var("NSX_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("NSX_PASSWORD")
        .expect("NSX_PASSWORD environment variable must be set");

    NsxClient::new(url, username, password, true).expect("Failed to create client")
}

#[tokio::test]
#[ignore] // Requires running NSX manager
async fn test_validate_credentials() {
    let client = client_from_env();
    let result = client.validate_credentials().await;
    assert!(result.is_ok(), "Failed to validate credentials: {:?}", result.err());
}

#[tokio::test]
#[ignore]
async fn test_search_all_vpcs() {
    let client = client_from_env();
    let service = VpcService::new(client, "integration".to_string(), LbProvider::NsxLb);

    let vpcs = service
        .get_all_vpcs_from_nsx()
        .await
        .expect("Failed to search VPCs");

    println!("Found {} VPCs", vpcs.len());
    for (path, vpc) in vpcs.iter().take(5) {
        println!("  {} private_ips={:?}", path, vpc.private_ips);
    }
}

#[tokio::test]
#[ignore]
async fn test_initialize_store() {
    let cluster = std::env::var("CLUSTER_NAME").unwrap_or_else(|_| "integration".to_string());
    let service = VpcService::new(client_from_env(), cluster, LbProvider::NsxLb);

    service.initialize().await.expect("Failed to load cluster VPCs");
    for vpc in service.list_vpc() {
        assert!(vpc.namespace().is_some(), "VPC {} has no namespace tag", vpc.path);
    }
}
