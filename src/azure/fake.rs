// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`DnsApi`] used by the reconciler tests.
//!
//! Behaves like Azure DNS where the reconcilers can observe it: a missing zone surfaces as
//! `ParentResourceNotFound` on record and link calls, new public zones get an apex NS record
//! set and two name servers, and deletes of missing record sets succeed. Every mutating call is
//! appended to an operation log so tests can assert exactly what was written.

use super::{
    method, CloudIdentity, DnsApi, DnsClientFactory, VirtualNetworkLink, Zone, ZoneKind,
    ZoneRef,
};
use crate::constants::ZONE_LOCATION_GLOBAL;
use crate::dns_errors::{DnsApiError, ARM_CODE_PARENT_RESOURCE_NOT_FOUND};
use crate::records::{
    canonical_name, record_fqdn, ObservedRecordSet, RecordData, RecordKey, RecordSet, RecordType,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// TTL the provider gives the apex NS record set of a new zone
pub const APEX_NS_TTL: u32 = 172_800;

type ZoneKey = (ZoneKind, String, String);

fn zone_key(zone: &ZoneRef) -> ZoneKey {
    (
        zone.kind,
        zone.resource_group.to_ascii_lowercase(),
        canonical_name(&zone.fqdn),
    )
}

#[derive(Debug, Default, Clone)]
struct FakeZone {
    tags: BTreeMap<String, String>,
    name_servers: Vec<String>,
    records: BTreeMap<RecordKey, ObservedRecordSet>,
    links: BTreeMap<String, VirtualNetworkLink>,
}

#[derive(Debug)]
struct Failure {
    error: DnsApiError,
    /// Remaining failures; `None` fails forever
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct FakeState {
    zones: BTreeMap<ZoneKey, FakeZone>,
    mutations: Vec<String>,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, Failure>,
}

/// In-memory Azure DNS.
#[derive(Debug, Default)]
pub struct FakeDns {
    state: Mutex<FakeState>,
}

impl FakeDns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake DNS state lock")
    }

    /// Create an empty zone without logging a mutation.
    pub fn seed_zone(&self, zone: &ZoneRef) {
        let mut state = self.state();
        state
            .zones
            .entry(zone_key(zone))
            .or_insert_with(|| new_zone(zone, BTreeMap::new()));
    }

    /// Store a record set without logging a mutation; creates the zone if needed.
    pub fn seed_record(&self, zone: &ZoneRef, record: ObservedRecordSet) {
        let mut state = self.state();
        let entry = state
            .zones
            .entry(zone_key(zone))
            .or_insert_with(|| new_zone(zone, BTreeMap::new()));
        entry.records.insert(record.key(), record);
    }

    /// Store a link without logging a mutation; creates the zone if needed.
    pub fn seed_link(&self, zone: &ZoneRef, link: VirtualNetworkLink) {
        let mut state = self.state();
        let entry = state
            .zones
            .entry(zone_key(zone))
            .or_insert_with(|| new_zone(zone, BTreeMap::new()));
        entry.links.insert(link.name.clone(), link);
    }

    /// Make every call of `method` fail with `error`.
    pub fn fail(&self, method: &'static str, error: DnsApiError) {
        self.state().failures.insert(
            method,
            Failure {
                error,
                remaining: None,
            },
        );
    }

    /// Make the next `times` calls of `method` fail with `error`.
    pub fn fail_times(&self, method: &'static str, error: DnsApiError, times: usize) {
        self.state().failures.insert(
            method,
            Failure {
                error,
                remaining: Some(times),
            },
        );
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Mutating calls in the order they were made, e.g. `CreateOrUpdateRecordSet z A api`.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.state().mutations.clone()
    }

    pub fn clear_mutations(&self) {
        self.state().mutations.clear();
    }

    /// Number of calls made to `method`, including failed ones.
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.state().calls.get(method).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn zone_exists(&self, zone: &ZoneRef) -> bool {
        self.state().zones.contains_key(&zone_key(zone))
    }

    /// Record sets of a zone in key order; empty if the zone does not exist.
    #[must_use]
    pub fn records(&self, zone: &ZoneRef) -> Vec<ObservedRecordSet> {
        self.state()
            .zones
            .get(&zone_key(zone))
            .map(|z| z.records.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn record(
        &self,
        zone: &ZoneRef,
        name: &str,
        record_type: RecordType,
    ) -> Option<ObservedRecordSet> {
        self.state()
            .zones
            .get(&zone_key(zone))
            .and_then(|z| z.records.get(&RecordKey::new(name, record_type)).cloned())
    }

    #[must_use]
    pub fn links(&self, zone: &ZoneRef) -> Vec<VirtualNetworkLink> {
        self.state()
            .zones
            .get(&zone_key(zone))
            .map(|z| z.links.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn zone_tags(&self, zone: &ZoneRef) -> Option<BTreeMap<String, String>> {
        self.state()
            .zones
            .get(&zone_key(zone))
            .map(|z| z.tags.clone())
    }

    fn begin(&self, method: &'static str) -> Result<MutexGuard<'_, FakeState>, DnsApiError> {
        let mut state = self.state();
        *state.calls.entry(method).or_default() += 1;
        if let Some(failure) = state.failures.get_mut(method) {
            let error = failure.error.clone();
            match failure.remaining.as_mut() {
                None => return Err(error),
                Some(0) => {}
                Some(n) => {
                    *n -= 1;
                    return Err(error);
                }
            }
        }
        Ok(state)
    }
}

/// Name servers the fake assigns to a new public zone.
#[must_use]
pub fn fake_name_servers() -> Vec<String> {
    vec![
        "ns1-01.azure-dns.com.".to_string(),
        "ns2-01.azure-dns.net.".to_string(),
    ]
}

fn new_zone(zone: &ZoneRef, tags: BTreeMap<String, String>) -> FakeZone {
    let mut created = FakeZone {
        tags,
        ..FakeZone::default()
    };
    if zone.kind == ZoneKind::Public {
        created.name_servers = fake_name_servers();
        let apex = ObservedRecordSet {
            name: "@".to_string(),
            record_type: RecordType::NS,
            ttl: Some(APEX_NS_TTL),
            data: Some(RecordData::Ns(created.name_servers.clone())),
            metadata: BTreeMap::new(),
            fqdn: Some(format!("{}.", zone.fqdn)),
            provisioning_state: Some("Succeeded".to_string()),
        };
        created.records.insert(apex.key(), apex);
    }
    created
}

fn zone_view(zone: &ZoneRef, stored: &FakeZone) -> Zone {
    Zone {
        name: zone.fqdn.clone(),
        location: ZONE_LOCATION_GLOBAL.to_string(),
        name_servers: stored.name_servers.clone(),
        number_of_record_sets: Some(stored.records.len() as u64),
        tags: stored.tags.clone(),
    }
}

fn parent_not_found(zone: &ZoneRef) -> DnsApiError {
    DnsApiError::NotFound {
        resource: zone.fqdn.clone(),
        code: ARM_CODE_PARENT_RESOURCE_NOT_FOUND.to_string(),
        message: format!("Can not perform requested operation on nested resource. Parent resource '{}' not found.", zone.fqdn),
    }
}

fn not_found(resource: String) -> DnsApiError {
    DnsApiError::NotFound {
        message: format!("The resource '{resource}' was not found"),
        resource,
        code: "NotFound".to_string(),
    }
}

#[async_trait]
impl DnsApi for FakeDns {
    async fn get_zone(&self, zone: &ZoneRef) -> Result<Zone, DnsApiError> {
        let state = self.begin(method::GET_ZONE)?;
        state
            .zones
            .get(&zone_key(zone))
            .map(|stored| zone_view(zone, stored))
            .ok_or_else(|| not_found(zone.fqdn.clone()))
    }

    async fn create_or_update_zone(
        &self,
        zone: &ZoneRef,
        tags: &BTreeMap<String, String>,
    ) -> Result<Zone, DnsApiError> {
        let mut state = self.begin(method::CREATE_OR_UPDATE_ZONE)?;
        state.mutations.push(format!(
            "{} {} {}",
            method::CREATE_OR_UPDATE_ZONE,
            zone.kind,
            zone.fqdn
        ));
        let stored = state
            .zones
            .entry(zone_key(zone))
            .and_modify(|z| z.tags = tags.clone())
            .or_insert_with(|| new_zone(zone, tags.clone()));
        Ok(zone_view(zone, stored))
    }

    async fn delete_zone(&self, zone: &ZoneRef) -> Result<(), DnsApiError> {
        let mut state = self.begin(method::DELETE_ZONE)?;
        if state.zones.remove(&zone_key(zone)).is_none() {
            return Err(not_found(zone.fqdn.clone()));
        }
        state
            .mutations
            .push(format!("{} {} {}", method::DELETE_ZONE, zone.kind, zone.fqdn));
        Ok(())
    }

    async fn list_record_sets(
        &self,
        zone: &ZoneRef,
    ) -> Result<Vec<ObservedRecordSet>, DnsApiError> {
        let state = self.begin(method::LIST_RECORD_SETS)?;
        state
            .zones
            .get(&zone_key(zone))
            .map(|z| z.records.values().cloned().collect())
            .ok_or_else(|| parent_not_found(zone))
    }

    async fn get_record_set(
        &self,
        zone: &ZoneRef,
        name: &str,
        record_type: RecordType,
    ) -> Result<ObservedRecordSet, DnsApiError> {
        let state = self.begin(method::GET_RECORD_SET)?;
        let stored = state
            .zones
            .get(&zone_key(zone))
            .ok_or_else(|| parent_not_found(zone))?;
        stored
            .records
            .get(&RecordKey::new(name, record_type))
            .cloned()
            .ok_or_else(|| not_found(format!("{}/{record_type}", record_fqdn(name, &zone.fqdn))))
    }

    async fn create_or_update_record_set(
        &self,
        zone: &ZoneRef,
        record: &RecordSet,
    ) -> Result<(), DnsApiError> {
        let mut state = self.begin(method::CREATE_OR_UPDATE_RECORD_SET)?;
        let stored = state
            .zones
            .get_mut(&zone_key(zone))
            .ok_or_else(|| parent_not_found(zone))?;
        let mut observed = ObservedRecordSet::from(record);
        observed.fqdn = Some(format!("{}.", record_fqdn(&record.name, &zone.fqdn)));
        observed.provisioning_state = Some("Succeeded".to_string());
        stored.records.insert(record.key(), observed);
        state.mutations.push(format!(
            "{} {} {} {}",
            method::CREATE_OR_UPDATE_RECORD_SET,
            zone.fqdn,
            record.record_type(),
            record.name
        ));
        Ok(())
    }

    async fn delete_record_set(
        &self,
        zone: &ZoneRef,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), DnsApiError> {
        let mut state = self.begin(method::DELETE_RECORD_SET)?;
        let stored = state
            .zones
            .get_mut(&zone_key(zone))
            .ok_or_else(|| parent_not_found(zone))?;
        stored.records.remove(&RecordKey::new(name, record_type));
        state.mutations.push(format!(
            "{} {} {record_type} {name}",
            method::DELETE_RECORD_SET,
            zone.fqdn
        ));
        Ok(())
    }

    async fn list_virtual_network_links(
        &self,
        zone: &ZoneRef,
    ) -> Result<Vec<VirtualNetworkLink>, DnsApiError> {
        let state = self.begin(method::LIST_VIRTUAL_NETWORK_LINKS)?;
        state
            .zones
            .get(&zone_key(zone))
            .map(|z| z.links.values().cloned().collect())
            .ok_or_else(|| parent_not_found(zone))
    }

    async fn create_or_update_virtual_network_link(
        &self,
        zone: &ZoneRef,
        link: &VirtualNetworkLink,
    ) -> Result<(), DnsApiError> {
        let mut state = self.begin(method::CREATE_OR_UPDATE_VIRTUAL_NETWORK_LINK)?;
        let stored = state
            .zones
            .get_mut(&zone_key(zone))
            .ok_or_else(|| parent_not_found(zone))?;
        let conflicting = stored
            .links
            .values()
            .any(|l| l.name != link.name && l.network_id.eq_ignore_ascii_case(&link.network_id));
        if conflicting {
            return Err(DnsApiError::Conflict {
                resource: link.name.clone(),
                message: "A virtual network can only be linked once to a private zone"
                    .to_string(),
            });
        }
        let mut created = link.clone();
        created.provisioning_state = Some("Succeeded".to_string());
        stored.links.insert(link.name.clone(), created);
        state.mutations.push(format!(
            "{} {} {}",
            method::CREATE_OR_UPDATE_VIRTUAL_NETWORK_LINK,
            zone.fqdn,
            link.name
        ));
        Ok(())
    }

    async fn delete_virtual_network_link(
        &self,
        zone: &ZoneRef,
        name: &str,
    ) -> Result<(), DnsApiError> {
        let mut state = self.begin(method::DELETE_VIRTUAL_NETWORK_LINK)?;
        let stored = state
            .zones
            .get_mut(&zone_key(zone))
            .ok_or_else(|| parent_not_found(zone))?;
        if stored.links.remove(name).is_none() {
            return Err(not_found(name.to_string()));
        }
        state.mutations.push(format!(
            "{} {} {name}",
            method::DELETE_VIRTUAL_NETWORK_LINK,
            zone.fqdn
        ));
        Ok(())
    }
}

/// Factory handing out the same [`FakeDns`] for every identity.
#[derive(Debug, Default)]
pub struct FakeFactory {
    pub dns: Arc<FakeDns>,
    requested: Mutex<Vec<String>>,
}

impl FakeFactory {
    #[must_use]
    pub fn new(dns: Arc<FakeDns>) -> Self {
        Self {
            dns,
            requested: Mutex::new(Vec::new()),
        }
    }

    /// Client ids clients were requested for, in order.
    #[must_use]
    pub fn requested_client_ids(&self) -> Vec<String> {
        self.requested.lock().expect("factory lock").clone()
    }
}

impl DnsClientFactory for FakeFactory {
    fn client(&self, identity: &CloudIdentity) -> Result<Arc<dyn DnsApi>, DnsApiError> {
        self.requested
            .lock()
            .expect("factory lock")
            .push(identity.client_id.clone());
        Ok(self.dns.clone())
    }
}
