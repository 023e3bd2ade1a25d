// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `delegation.rs`

#[cfg(test)]
mod tests {
    use crate::azure::fake::{fake_name_servers, FakeDns};
    use crate::azure::{method, ZoneRef};
    use crate::dns_errors::ErrorKind;
    use crate::reconcilers::delegation::{delete_delegation, reconcile_delegation};
    use crate::records::{ObservedRecordSet, RecordData, RecordSet, RecordType};

    fn base_zone() -> ZoneRef {
        ZoneRef::public("root-dns", "basedomain.io")
    }

    fn ns(name: &str, ttl: u32, hosts: &[&str]) -> ObservedRecordSet {
        ObservedRecordSet::from(&RecordSet::owned(
            name,
            ttl,
            RecordData::Ns(hosts.iter().map(|h| (*h).to_string()).collect()),
        ))
    }

    #[tokio::test]
    async fn test_creates_delegation() {
        let dns = FakeDns::new();
        dns.seed_zone(&base_zone());

        let ops = reconcile_delegation(&dns, &base_zone(), "test-cluster", &fake_name_servers())
            .await
            .expect("delegation");

        assert_eq!(ops.len(), 1);
        let record = dns
            .record(&base_zone(), "test-cluster", RecordType::NS)
            .expect("NS written");
        assert_eq!(record.ttl, Some(300));
        assert_eq!(record.data, Some(RecordData::Ns(fake_name_servers())));
        assert_eq!(dns.calls(method::LIST_RECORD_SETS), 0);
    }

    #[tokio::test]
    async fn test_equivalent_delegation_is_left_alone() {
        let dns = FakeDns::new();
        dns.seed_record(
            &base_zone(),
            ns("test-cluster", 300, &["NS2-01.azure-dns.net", "ns1-01.azure-dns.com."]),
        );

        let ops = reconcile_delegation(&dns, &base_zone(), "test-cluster", &fake_name_servers())
            .await
            .expect("delegation");

        assert!(ops.is_empty());
        assert!(dns.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_stale_delegation_is_updated_and_siblings_untouched() {
        let dns = FakeDns::new();
        dns.seed_record(&base_zone(), ns("test-cluster", 3600, &["old.example.com."]));
        dns.seed_record(&base_zone(), ns("other-cluster", 300, &["ns.other.example."]));

        reconcile_delegation(&dns, &base_zone(), "test-cluster", &fake_name_servers())
            .await
            .expect("delegation");

        assert_eq!(
            dns.mutations(),
            vec!["CreateOrUpdateRecordSet basedomain.io NS test-cluster"]
        );
        assert!(dns
            .record(&base_zone(), "other-cluster", RecordType::NS)
            .is_some());
    }

    #[tokio::test]
    async fn test_missing_base_zone_is_invalid_config() {
        let dns = FakeDns::new();

        let err = reconcile_delegation(&dns, &base_zone(), "test-cluster", &fake_name_servers())
            .await
            .expect_err("no base zone");

        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn test_no_name_servers_is_retryable() {
        let dns = FakeDns::new();
        dns.seed_zone(&base_zone());

        let err = reconcile_delegation(&dns, &base_zone(), "test-cluster", &[])
            .await
            .expect_err("no name servers");

        assert!(err.is_retryable());
        assert!(dns.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_only_own_label() {
        let dns = FakeDns::new();
        dns.seed_record(&base_zone(), ns("test-cluster", 300, &["ns1-01.azure-dns.com."]));
        dns.seed_record(&base_zone(), ns("other-cluster", 300, &["ns.other.example."]));

        delete_delegation(&dns, &base_zone(), "test-cluster")
            .await
            .expect("deleted");

        assert_eq!(
            dns.mutations(),
            vec!["DeleteRecordSet basedomain.io NS test-cluster"]
        );
        assert!(dns.record(&base_zone(), "test-cluster", RecordType::NS).is_none());
        assert!(dns
            .record(&base_zone(), "other-cluster", RecordType::NS)
            .is_some());
    }

    #[tokio::test]
    async fn test_delete_without_base_zone_succeeds() {
        let dns = FakeDns::new();
        delete_delegation(&dns, &base_zone(), "test-cluster")
            .await
            .expect("nothing to delete");
    }
}
