// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record-set model shared by the builders, the differ and the cloud facade.
//!
//! Record kinds are a closed set: `A`, `CNAME` and `NS`. Names are labels relative to their
//! zone (`@` is the apex) and are compared case-insensitively; desired names keep their case
//! when written.

use crate::constants::{APEX_RECORD_NAME, RECORD_OWNER, RECORD_SOURCE_GATEWAY};
use crate::labels::{RECORD_MANAGED_BY_KEY, RECORD_SOURCE_KEY};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// DNS record types the operator manages.
///
/// The declaration order is the sort order of differ operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordType {
    A,
    CNAME,
    NS,
}

impl RecordType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::CNAME => "CNAME",
            Self::NS => "NS",
        }
    }

    /// A and CNAME records cannot share a name inside one zone.
    #[must_use]
    pub fn excludes(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::A, Self::CNAME) | (Self::CNAME, Self::A)
        )
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "CNAME" => Ok(Self::CNAME),
            "NS" => Ok(Self::NS),
            other => Err(format!("unsupported record type {other}")),
        }
    }
}

/// Type-tagged record payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordData {
    /// Ordered, non-empty list of IPv4 addresses
    A(Vec<Ipv4Addr>),
    /// Exactly one target FQDN
    Cname(String),
    /// Ordered, non-empty list of name server FQDNs
    Ns(Vec<String>),
}

impl RecordData {
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::A(_) => RecordType::A,
            Self::Cname(_) => RecordType::CNAME,
            Self::Ns(_) => RecordType::NS,
        }
    }

    /// Payload values rendered as strings, one per address / target / host.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::A(addresses) => addresses.iter().map(ToString::to_string).collect(),
            Self::Cname(target) => vec![target.clone()],
            Self::Ns(hosts) => hosts.clone(),
        }
    }

    /// Payload equality under the type's canonicalization rule.
    ///
    /// A compares the multiset of addresses; CNAME and NS compare canonical names
    /// (lowercase, one trailing dot stripped), NS as a multiset.
    #[must_use]
    pub fn payload_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::A(left), Self::A(right)) => {
                let mut left = left.clone();
                let mut right = right.clone();
                left.sort_unstable();
                right.sort_unstable();
                left == right
            }
            (Self::Cname(left), Self::Cname(right)) => {
                canonical_name(left) == canonical_name(right)
            }
            (Self::Ns(left), Self::Ns(right)) => {
                let mut left: Vec<String> = left.iter().map(|h| canonical_name(h)).collect();
                let mut right: Vec<String> = right.iter().map(|h| canonical_name(h)).collect();
                left.sort_unstable();
                right.sort_unstable();
                left == right
            }
            _ => false,
        }
    }
}

/// Lowercase a DNS name and strip one optional trailing dot.
#[must_use]
pub fn canonical_name(name: &str) -> String {
    let lowered = name.to_ascii_lowercase();
    match lowered.strip_suffix('.') {
        Some(stripped) => stripped.to_string(),
        None => lowered,
    }
}

/// Fully qualified name of a record label inside a zone.
#[must_use]
pub fn record_fqdn(name: &str, zone: &str) -> String {
    if name == APEX_RECORD_NAME {
        zone.to_string()
    } else {
        format!("{name}.{zone}")
    }
}

/// A record set the engine wants to exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSet {
    pub name: String,
    pub ttl: u32,
    pub data: RecordData,
    /// Opaque key/value metadata stored with the record; never compared
    pub metadata: BTreeMap<String, String>,
}

impl RecordSet {
    /// Build a record set carrying the operator ownership marker.
    #[must_use]
    pub fn owned(name: impl Into<String>, ttl: u32, data: RecordData) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(RECORD_MANAGED_BY_KEY.to_string(), RECORD_OWNER.to_string());
        Self {
            name: name.into(),
            ttl,
            data,
            metadata,
        }
    }

    /// Mark the record as derived from a gateway service.
    #[must_use]
    pub fn from_gateway(mut self) -> Self {
        self.metadata
            .insert(RECORD_SOURCE_KEY.to_string(), RECORD_SOURCE_GATEWAY.to_string());
        self
    }

    #[must_use]
    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }

    /// Key used to match against observed record sets.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.name, self.record_type())
    }
}

/// A record set as returned by the cloud DNS API.
///
/// `data` is `None` when the API returned the record without the payload of its type
/// (for example an A record set without an address list).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservedRecordSet {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: Option<u32>,
    pub data: Option<RecordData>,
    pub metadata: BTreeMap<String, String>,
    pub fqdn: Option<String>,
    pub provisioning_state: Option<String>,
}

impl ObservedRecordSet {
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.name, self.record_type)
    }

    /// Whether this record was written by the operator from a gateway service.
    #[must_use]
    pub fn is_gateway_owned(&self) -> bool {
        self.metadata.get(RECORD_MANAGED_BY_KEY).map(String::as_str) == Some(RECORD_OWNER)
            && self.metadata.get(RECORD_SOURCE_KEY).map(String::as_str)
                == Some(RECORD_SOURCE_GATEWAY)
    }

    /// Payload-only equality with a desired record: TTL and data, nothing server-side.
    #[must_use]
    pub fn matches(&self, desired: &RecordSet) -> bool {
        if self.record_type != desired.record_type() || self.ttl != Some(desired.ttl) {
            return false;
        }
        self.data
            .as_ref()
            .is_some_and(|data| data.payload_eq(&desired.data))
    }
}

impl From<&RecordSet> for ObservedRecordSet {
    fn from(record: &RecordSet) -> Self {
        Self {
            name: record.name.clone(),
            record_type: record.record_type(),
            ttl: Some(record.ttl),
            data: Some(record.data.clone()),
            metadata: record.metadata.clone(),
            fqdn: None,
            provisioning_state: None,
        }
    }
}

/// Case-insensitive `(name, type)` key of a record set.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub name: String,
    pub record_type: RecordType,
}

impl RecordKey {
    #[must_use]
    pub fn new(name: &str, record_type: RecordType) -> Self {
        Self {
            name: canonical_name(name),
            record_type,
        }
    }
}

/// One change the differ asks the reconciler to apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Upsert(RecordSet),
    Delete { name: String, record_type: RecordType },
}

impl Op {
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Upsert(record) => record.record_type(),
            Self::Delete { record_type, .. } => *record_type,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Upsert(record) => &record.name,
            Self::Delete { name, .. } => name,
        }
    }

    /// Sort key used to order operations deterministically.
    #[must_use]
    pub fn sort_key(&self) -> (RecordType, String) {
        (self.record_type(), canonical_name(self.name()))
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upsert(record) => write!(
                f,
                "upsert {} {} ttl={} [{}]",
                record.record_type(),
                record.name,
                record.ttl,
                record.data.values().join(",")
            ),
            Self::Delete { name, record_type } => write!(f, "delete {record_type} {name}"),
        }
    }
}

/// The closed set of record names the engine is authoritative for inside one zone.
///
/// Entries are `(canonical name, type)`; a `None` type covers the A and CNAME kinds only,
/// so provider-owned apex NS/SOA records are never touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ManagedSet {
    entries: BTreeSet<(String, Option<RecordType>)>,
    adopt_gateway_records: bool,
}

impl ManagedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Manage the A and CNAME records with this name.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.entries.insert((canonical_name(name), None));
        self
    }

    /// Manage exactly one `(name, type)` pair.
    #[must_use]
    pub fn with_record(mut self, name: &str, record_type: RecordType) -> Self {
        self.entries
            .insert((canonical_name(name), Some(record_type)));
        self
    }

    /// Also manage observed records carrying the gateway ownership marker.
    #[must_use]
    pub fn adopting_gateway_records(mut self, adopt: bool) -> Self {
        self.adopt_gateway_records = adopt;
        self
    }

    /// Whether the engine is authoritative for an observed record set.
    #[must_use]
    pub fn contains(&self, record: &ObservedRecordSet) -> bool {
        if self.adopt_gateway_records && record.is_gateway_owned() {
            return true;
        }
        self.contains_key(&record.key())
    }

    #[must_use]
    pub fn contains_key(&self, key: &RecordKey) -> bool {
        let exact = (key.name.clone(), Some(key.record_type));
        if self.entries.contains(&exact) {
            return true;
        }
        matches!(key.record_type, RecordType::A | RecordType::CNAME)
            && self.entries.contains(&(key.name.clone(), None))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && !self.adopt_gateway_records
    }
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod records_tests;
