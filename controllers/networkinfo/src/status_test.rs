//! Unit tests for status projection

#[cfg(test)]
mod tests {
    use crate::conditions::{NamespaceReadyReason, namespace_not_ready, namespace_ready};
    use crate::status::*;
    use crate::test_utils::*;
    use crds::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn projector() -> (StatusProjector, MockClusterClient) {
        let cluster = MockClusterClient::new();
        (StatusProjector::new(Arc::new(cluster.clone())), cluster)
    }

    fn state(name: &str, ips: &[&str]) -> VPCState {
        VPCState {
            name: name.to_string(),
            default_snat_ip: "10.1.0.1".to_string(),
            private_ips: ips.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn vpc_info(name: &str, path: &str) -> VPCInfo {
        VPCInfo {
            name: name.to_string(),
            vpc_path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ip_sets_ignore_order() {
        let a = vec!["10.0.0.0/24".to_string(), "10.1.0.0/24".to_string()];
        let b = vec!["10.1.0.0/24".to_string(), "10.0.0.0/24".to_string()];
        assert!(same_ip_set(&a, &b));
        assert!(!same_ip_set(&a, &b[..1]));
        assert!(same_vpc_state(
            &state("team-a", &["10.0.0.0/24", "10.1.0.0/24"]),
            &state("team-a", &["10.1.0.0/24", "10.0.0.0/24"])
        ));
    }

    #[tokio::test]
    async fn test_matching_vpc_state_is_not_rewritten() {
        let (projector, cluster) = projector();
        let mut ni = create_test_network_info("team-a", "team-a");
        cluster.add_network_info(ni.clone());

        assert!(projector
            .update_network_info_state(&ni, state("team-a", &["10.0.0.0/24"]))
            .await
            .unwrap());
        assert_eq!(cluster.vpc_state_writes(), 1);

        ni = cluster.network_info("team-a", "team-a").unwrap();
        assert_eq!(ni.spec.vpcs.len(), 1);
        assert!(!projector
            .update_network_info_state(&ni, state("team-a", &["10.0.0.0/24"]))
            .await
            .unwrap());
        assert_eq!(cluster.vpc_state_writes(), 1);
    }

    #[tokio::test]
    async fn test_reordered_private_ips_are_not_rewritten() {
        let (projector, cluster) = projector();
        cluster.add_network_info(create_test_network_info("team-a", "team-a"));
        let ni = cluster.network_info("team-a", "team-a").unwrap();

        assert!(projector
            .update_network_info_state(&ni, state("team-a", &["10.0.0.0/24", "10.1.0.0/24"]))
            .await
            .unwrap());

        let ni = cluster.network_info("team-a", "team-a").unwrap();
        assert!(!projector
            .update_network_info_state(&ni, state("team-a", &["10.1.0.0/24", "10.0.0.0/24"]))
            .await
            .unwrap());
        assert_eq!(cluster.vpc_state_writes(), 1);
        assert_eq!(
            cluster.network_info("team-a", "team-a").unwrap().spec.vpcs[0].private_ips,
            vec!["10.0.0.0/24".to_string(), "10.1.0.0/24".to_string()]
        );
    }

    #[tokio::test]
    async fn test_namespace_condition_written_once() {
        let (projector, cluster) = projector();
        cluster.add_namespace(create_test_namespace("team-a", "ns-uid-team-a", &[]));

        let not_ready = namespace_not_ready(NamespaceReadyReason::VpcNotReady, "create failed");
        assert!(projector.set_namespace_condition("team-a", not_ready.clone()).await.unwrap());
        assert!(!projector.set_namespace_condition("team-a", not_ready).await.unwrap());
        assert_eq!(cluster.namespace_condition_writes(), 1);

        assert!(projector.set_namespace_condition("team-a", namespace_ready()).await.unwrap());
        let condition = cluster.namespace_condition("team-a").unwrap();
        assert_eq!(condition.status, CONDITION_TRUE);
        assert_eq!(condition.reason, None);
    }

    #[tokio::test]
    async fn test_missing_namespace_is_skipped() {
        let (projector, cluster) = projector();
        assert!(!projector.set_namespace_condition("gone", namespace_ready()).await.unwrap());
        assert_eq!(cluster.namespace_condition_writes(), 0);
    }

    #[tokio::test]
    async fn test_upsert_vpc_info_by_name() {
        let (projector, cluster) = projector();
        cluster.add_config(create_test_config("default", true, None));

        projector.upsert_config_vpc_info("default", vpc_info("team-a", "/vpcs/a")).await.unwrap();
        projector.upsert_config_vpc_info("default", vpc_info("team-b", "/vpcs/b")).await.unwrap();
        projector.upsert_config_vpc_info("default", vpc_info("team-a", "/vpcs/a2")).await.unwrap();
        assert!(!projector
            .upsert_config_vpc_info("default", vpc_info("team-b", "/vpcs/b"))
            .await
            .unwrap());

        let vpcs = cluster.config("default").unwrap().status.unwrap().vpcs;
        assert_eq!(vpcs.len(), 2);
        assert_eq!(vpcs[0].vpc_path, "/vpcs/a2");
        assert_eq!(cluster.config_status_writes(), 3);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_first_entry() {
        let (projector, cluster) = projector();
        cluster.add_config(create_test_config("shared", false, Some("/orgs/default/projects/proj-1/vpcs/shared")));

        projector
            .overwrite_config_single_vpc_info("shared", vpc_info("old-name", "/vpcs/shared"))
            .await
            .unwrap();
        projector
            .overwrite_config_single_vpc_info("shared", vpc_info("new-name", "/vpcs/shared"))
            .await
            .unwrap();

        let vpcs = cluster.config("shared").unwrap().status.unwrap().vpcs;
        assert_eq!(vpcs.len(), 1);
        assert_eq!(vpcs[0].name, "new-name");
    }

    #[tokio::test]
    async fn test_remove_vpc_infos_only_touches_changed_configs() {
        let (projector, cluster) = projector();
        cluster.add_config(create_test_config("default", true, None));
        cluster.add_config(create_test_config("other", false, None));
        projector.upsert_config_vpc_info("default", vpc_info("team-a", "/vpcs/a")).await.unwrap();
        projector.upsert_config_vpc_info("default", vpc_info("team-b", "/vpcs/b")).await.unwrap();
        projector.upsert_config_vpc_info("other", vpc_info("team-c", "/vpcs/c")).await.unwrap();
        let writes = cluster.config_status_writes();

        let deleted = HashSet::from(["team-a".to_string()]);
        assert_eq!(projector.remove_config_vpc_infos(&deleted).await.unwrap(), 1);
        assert_eq!(cluster.config_status_writes(), writes + 1);

        let names: Vec<_> = cluster
            .config("default")
            .unwrap()
            .status
            .unwrap()
            .vpcs
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["team-b".to_string()]);
        assert_eq!(cluster.config("other").unwrap().status.unwrap().vpcs.len(), 1);
    }

    #[tokio::test]
    async fn test_config_condition_merges_by_type() {
        let (projector, cluster) = projector();
        cluster.add_config(create_test_config("system", false, None));

        projector
            .set_config_condition("system", Condition::ready(CONDITION_GATEWAY_CONNECTION_READY, None))
            .await
            .unwrap();
        projector
            .set_config_condition(
                "system",
                Condition::not_ready(CONDITION_AUTO_SNAT_ENABLED, "AutoSnatNotEnabled", "off"),
            )
            .await
            .unwrap();
        assert!(!projector
            .set_config_condition("system", Condition::ready(CONDITION_GATEWAY_CONNECTION_READY, None))
            .await
            .unwrap());

        let conditions = cluster.config("system").unwrap().status.unwrap().conditions;
        assert_eq!(conditions.len(), 2);
    }
}
