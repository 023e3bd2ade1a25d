// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `records.rs`

#[cfg(test)]
mod tests {
    use crate::records::*;
    use std::collections::BTreeMap;
    use std::net::Ipv4Addr;

    fn observed(name: &str, record_type: RecordType) -> ObservedRecordSet {
        ObservedRecordSet {
            name: name.to_string(),
            record_type,
            ttl: Some(300),
            data: None,
            metadata: BTreeMap::new(),
            fqdn: None,
            provisioning_state: None,
        }
    }

    #[test]
    fn test_canonical_name_strips_one_trailing_dot() {
        assert_eq!(canonical_name("Ingress.Example.COM."), "ingress.example.com");
        assert_eq!(canonical_name("example.com"), "example.com");
        assert_eq!(canonical_name("example.com.."), "example.com.");
    }

    #[test]
    fn test_a_payload_ignores_order() {
        let left = RecordData::A(vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]);
        let right = RecordData::A(vec![Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1)]);
        assert!(left.payload_eq(&right));
    }

    #[test]
    fn test_a_payload_is_a_multiset() {
        let left = RecordData::A(vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 1)]);
        let right = RecordData::A(vec![Ipv4Addr::new(10, 0, 0, 1)]);
        assert!(!left.payload_eq(&right));
    }

    #[test]
    fn test_cname_payload_is_canonicalized() {
        let left = RecordData::Cname("Ingress.Test.io.".to_string());
        let right = RecordData::Cname("ingress.test.io".to_string());
        assert!(left.payload_eq(&right));
    }

    #[test]
    fn test_ns_payload_is_canonicalized_multiset() {
        let left = RecordData::Ns(vec![
            "ns1-01.azure-dns.com.".to_string(),
            "NS2-01.azure-dns.net".to_string(),
        ]);
        let right = RecordData::Ns(vec![
            "ns2-01.azure-dns.net.".to_string(),
            "ns1-01.azure-dns.com".to_string(),
        ]);
        assert!(left.payload_eq(&right));
    }

    #[test]
    fn test_payload_of_different_types_never_equal() {
        let a = RecordData::A(vec![Ipv4Addr::new(1, 1, 1, 1)]);
        let cname = RecordData::Cname("1.1.1.1".to_string());
        assert!(!a.payload_eq(&cname));
    }

    #[test]
    fn test_observed_without_payload_does_not_match() {
        let desired = RecordSet::owned("api", 300, RecordData::A(vec![Ipv4Addr::new(8, 8, 8, 8)]));
        let record = observed("api", RecordType::A);
        assert!(!record.matches(&desired));
    }

    #[test]
    fn test_observed_ignores_server_side_metadata() {
        let desired = RecordSet::owned("api", 300, RecordData::A(vec![Ipv4Addr::new(8, 8, 8, 8)]));
        let mut record = ObservedRecordSet::from(&desired);
        record.provisioning_state = Some("Updating".to_string());
        record.fqdn = Some("api.test.io.".to_string());
        record.metadata.clear();
        assert!(record.matches(&desired));
    }

    #[test]
    fn test_record_fqdn_apex() {
        assert_eq!(record_fqdn("@", "test.io"), "test.io");
        assert_eq!(record_fqdn("api", "test.io"), "api.test.io");
    }

    #[test]
    fn test_record_type_parse_and_exclusion() {
        assert_eq!("cname".parse::<RecordType>(), Ok(RecordType::CNAME));
        assert!("TXT".parse::<RecordType>().is_err());
        assert!(RecordType::A.excludes(RecordType::CNAME));
        assert!(!RecordType::A.excludes(RecordType::NS));
    }

    #[test]
    fn test_managed_set_name_entry_covers_a_and_cname_only() {
        let managed = ManagedSet::new().with_name("@").with_name("API");
        assert!(managed.contains(&observed("api", RecordType::A)));
        assert!(managed.contains(&observed("api", RecordType::CNAME)));
        assert!(!managed.contains(&observed("@", RecordType::NS)));
        assert!(!managed.contains(&observed("www", RecordType::A)));
    }

    #[test]
    fn test_managed_set_exact_record_entry() {
        let managed = ManagedSet::new().with_record("test-cluster", RecordType::NS);
        assert!(managed.contains(&observed("Test-Cluster", RecordType::NS)));
        assert!(!managed.contains(&observed("test-cluster", RecordType::A)));
        assert!(!managed.contains(&observed("other-cluster", RecordType::NS)));
    }

    #[test]
    fn test_managed_set_adopts_gateway_marked_records() {
        let record = ObservedRecordSet::from(
            &RecordSet::owned("grafana", 300, RecordData::A(vec![Ipv4Addr::new(1, 2, 3, 4)]))
                .from_gateway(),
        );
        assert!(record.is_gateway_owned());
        assert!(!ManagedSet::new().contains(&record));
        assert!(ManagedSet::new()
            .adopting_gateway_records(true)
            .contains(&record));
    }

    #[test]
    fn test_op_display() {
        let op = Op::Upsert(RecordSet::owned(
            "api",
            300,
            RecordData::A(vec![Ipv4Addr::new(8, 8, 8, 8)]),
        ));
        assert_eq!(op.to_string(), "upsert A api ttl=300 [8.8.8.8]");
        let op = Op::Delete {
            name: "bastion".to_string(),
            record_type: RecordType::A,
        };
        assert_eq!(op.to_string(), "delete A bastion");
    }
}
