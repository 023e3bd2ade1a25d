// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for context.rs

#[cfg(test)]
mod tests {
    use crate::context::{object_key, FailureTracker};
    use crate::crd::{AzureCluster, AzureClusterSpec};

    #[test]
    fn test_failures_count_per_key() {
        let tracker = FailureTracker::default();
        assert_eq!(tracker.record_failure("default/wc1"), 1);
        assert_eq!(tracker.record_failure("default/wc1"), 2);
        assert_eq!(tracker.record_failure("default/wc2"), 1);
        assert_eq!(tracker.failures("default/wc1"), 2);
    }

    #[test]
    fn test_reset_clears_only_that_key() {
        let tracker = FailureTracker::default();
        tracker.record_failure("default/wc1");
        tracker.record_failure("default/wc2");

        tracker.reset("default/wc1");

        assert_eq!(tracker.failures("default/wc1"), 0);
        assert_eq!(tracker.failures("default/wc2"), 1);
        assert_eq!(tracker.record_failure("default/wc1"), 1);
    }

    #[test]
    fn test_object_key() {
        let mut infra = AzureCluster::new("wc1", AzureClusterSpec::default());
        infra.metadata.namespace = Some("org-a".to_string());
        assert_eq!(object_key(&infra), "org-a/wc1");
    }
}
