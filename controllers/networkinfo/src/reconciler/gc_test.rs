//! Unit tests for orphan VPC garbage collection

#[cfg(test)]
mod tests {
    use crate::reconciler::gc::GcReport;
    use crate::test_utils::*;
    use nsx_client::{LbProvider, VpcGatewayTrait};

    #[tokio::test]
    async fn test_empty_store_skips_namespace_list() {
        let harness = TestHarness::new(LbProvider::NsxLb);
        harness.cluster.fail_namespace_list();

        let report = harness.reconciler.collect_garbage().await.unwrap();
        assert_eq!(report, GcReport::default());
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_sweep() {
        let harness = TestHarness::new(LbProvider::NsxLb);
        harness
            .cluster
            .add_namespace(create_test_namespace("live", "ns-uid-live", &[]));
        let live = test_managed_vpc("live", "ns-uid-live", "ni-uid-live");
        harness.gateway.add_managed_vpc(live.clone());
        let orphans: Vec<_> = ["gone-a", "gone-b", "gone-c"]
            .iter()
            .map(|ns| test_managed_vpc(ns, &format!("ns-uid-{}", ns), &format!("ni-uid-{}", ns)))
            .collect();
        for vpc in &orphans {
            harness.gateway.add_managed_vpc(vpc.clone());
        }
        harness.gateway.fail_delete(&orphans[1].path);

        let report = harness.reconciler.collect_garbage().await.unwrap();

        assert_eq!(
            report,
            GcReport {
                attempted: 3,
                deleted: 2,
                failed: 1
            }
        );
        let mut attempted = harness.gateway.deleted_paths();
        attempted.sort();
        let mut expected: Vec<_> = orphans.iter().map(|v| v.path.clone()).collect();
        expected.sort();
        assert_eq!(attempted, expected);

        let remaining = harness.gateway.list_vpc();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&live));
        assert_eq!(
            harness
                .metrics
                .gc_vpcs_total
                .with_label_values(&["deleted"])
                .get(),
            2
        );
        assert_eq!(
            harness
                .metrics
                .gc_vpcs_total
                .with_label_values(&["failed"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_namespace_list_failure_aborts() {
        let harness = TestHarness::new(LbProvider::NsxLb);
        harness
            .gateway
            .add_managed_vpc(test_managed_vpc("gone", "ns-uid-gone", "ni-uid-gone"));
        harness.cluster.fail_namespace_list();

        assert!(harness.reconciler.collect_garbage().await.is_err());
        assert!(harness.gateway.deleted_paths().is_empty());
    }

    #[tokio::test]
    async fn test_vpcs_without_namespace_tag_are_left_alone() {
        let harness = TestHarness::new(LbProvider::NsxLb);
        let mut untagged = test_managed_vpc("gone", "ns-uid-gone", "ni-uid-gone");
        untagged.tags.clear();
        harness.gateway.add_managed_vpc(untagged);

        let report = harness.reconciler.collect_garbage().await.unwrap();
        assert_eq!(report.attempted, 0);
        assert!(harness.gateway.deleted_paths().is_empty());
    }
}
