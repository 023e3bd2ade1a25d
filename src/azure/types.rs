// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure Resource Manager wire types for DNS zones, record sets and virtual network links.
//!
//! Public DNS (`Microsoft.Network/dnsZones`) and private DNS
//! (`Microsoft.Network/privateDnsZones`) use different casing for the same record
//! properties (`TTL`/`ARecords` vs `ttl`/`aRecords`). Responses accept both through serde
//! aliases; request bodies are rendered per zone kind.

use super::{VirtualNetworkLink, Zone, ZoneKind};
use crate::constants::ZONE_LOCATION_GLOBAL;
use crate::records::{ObservedRecordSet, RecordData, RecordSet, RecordType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Zone resource.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmZone {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub properties: Option<ArmZoneProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmZoneProperties {
    #[serde(default)]
    pub name_servers: Option<Vec<String>>,
    #[serde(default)]
    pub number_of_record_sets: Option<u64>,
}

impl From<ArmZone> for Zone {
    fn from(zone: ArmZone) -> Self {
        let properties = zone.properties.unwrap_or_default();
        Self {
            name: zone.name.unwrap_or_default(),
            location: zone.location.unwrap_or_default(),
            name_servers: properties.name_servers.unwrap_or_default(),
            number_of_record_sets: properties.number_of_record_sets,
            tags: zone.tags.unwrap_or_default(),
        }
    }
}

/// Request body creating or updating a zone.
#[must_use]
pub fn zone_body(kind: ZoneKind, tags: &BTreeMap<String, String>) -> Value {
    match kind {
        ZoneKind::Public => json!({
            "location": ZONE_LOCATION_GLOBAL,
            "tags": tags,
            "properties": { "zoneType": "Public" },
        }),
        ZoneKind::Private => json!({
            "location": ZONE_LOCATION_GLOBAL,
            "tags": tags,
        }),
    }
}

/// Record set resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArmRecordSet {
    #[serde(default)]
    pub name: Option<String>,
    /// Resource type, e.g. `Microsoft.Network/dnszones/A`
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub properties: Option<ArmRecordSetProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArmRecordSetProperties {
    #[serde(default, rename = "TTL", alias = "ttl")]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default, rename = "provisioningState")]
    pub provisioning_state: Option<String>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(default, rename = "ARecords", alias = "aRecords")]
    pub a_records: Option<Vec<ArmARecord>>,
    #[serde(default, rename = "CNAMERecord", alias = "cnameRecord")]
    pub cname_record: Option<ArmCnameRecord>,
    #[serde(default, rename = "NSRecords", alias = "nsRecords")]
    pub ns_records: Option<Vec<ArmNsRecord>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmARecord {
    #[serde(default)]
    pub ipv4_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmCnameRecord {
    #[serde(default)]
    pub cname: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmNsRecord {
    #[serde(default)]
    pub nsdname: Option<String>,
}

/// Record type from the last segment of an ARM resource type.
#[must_use]
pub fn record_type_from_resource_type(resource_type: &str) -> Option<RecordType> {
    resource_type.rsplit('/').next()?.parse().ok()
}

impl ArmRecordSet {
    /// Convert to the record model, or `None` for record types the operator never manages.
    ///
    /// A payload that is absent, empty or unparsable yields `data: None`, which the differ
    /// treats as unequal to any desired record.
    #[must_use]
    pub fn into_observed(self) -> Option<ObservedRecordSet> {
        let record_type = record_type_from_resource_type(self.resource_type.as_deref()?)?;
        let properties = self.properties.unwrap_or_default();

        let data = match record_type {
            RecordType::A => properties.a_records.and_then(|records| {
                let addresses: Option<Vec<Ipv4Addr>> = records
                    .iter()
                    .map(|r| r.ipv4_address.as_deref()?.parse().ok())
                    .collect();
                addresses.filter(|a| !a.is_empty()).map(RecordData::A)
            }),
            RecordType::CNAME => properties
                .cname_record
                .and_then(|r| r.cname)
                .filter(|c| !c.is_empty())
                .map(RecordData::Cname),
            RecordType::NS => properties.ns_records.and_then(|records| {
                let hosts: Option<Vec<String>> =
                    records.into_iter().map(|r| r.nsdname).collect();
                hosts.filter(|h| !h.is_empty()).map(RecordData::Ns)
            }),
        };

        Some(ObservedRecordSet {
            name: self.name.unwrap_or_default(),
            record_type,
            ttl: properties.ttl,
            data,
            metadata: properties.metadata.unwrap_or_default(),
            fqdn: properties.fqdn,
            provisioning_state: properties.provisioning_state,
        })
    }
}

/// Request body creating or updating a record set, cased for the zone kind.
#[must_use]
pub fn record_set_body(kind: ZoneKind, record: &RecordSet) -> Value {
    let (ttl_key, a_key, cname_key, ns_key) = match kind {
        ZoneKind::Public => ("TTL", "ARecords", "CNAMERecord", "NSRecords"),
        ZoneKind::Private => ("ttl", "aRecords", "cnameRecord", "nsRecords"),
    };

    let mut properties = serde_json::Map::new();
    properties.insert(ttl_key.to_string(), json!(record.ttl));
    properties.insert("metadata".to_string(), json!(record.metadata));
    match &record.data {
        RecordData::A(addresses) => {
            let records: Vec<ArmARecord> = addresses
                .iter()
                .map(|ip| ArmARecord {
                    ipv4_address: Some(ip.to_string()),
                })
                .collect();
            properties.insert(a_key.to_string(), json!(records));
        }
        RecordData::Cname(target) => {
            properties.insert(
                cname_key.to_string(),
                json!(ArmCnameRecord {
                    cname: Some(target.clone())
                }),
            );
        }
        RecordData::Ns(hosts) => {
            let records: Vec<ArmNsRecord> = hosts
                .iter()
                .map(|h| ArmNsRecord {
                    nsdname: Some(h.clone()),
                })
                .collect();
            properties.insert(ns_key.to_string(), json!(records));
        }
    }

    json!({ "properties": properties })
}

/// Virtual network link resource.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArmVirtualNetworkLink {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub properties: Option<ArmVirtualNetworkLinkProperties>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmVirtualNetworkLinkProperties {
    #[serde(default)]
    pub virtual_network: Option<ArmSubResource>,
    #[serde(default)]
    pub registration_enabled: Option<bool>,
    #[serde(default)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmSubResource {
    #[serde(default)]
    pub id: Option<String>,
}

impl From<ArmVirtualNetworkLink> for VirtualNetworkLink {
    fn from(link: ArmVirtualNetworkLink) -> Self {
        let properties = link.properties.unwrap_or_default();
        Self {
            name: link.name.unwrap_or_default(),
            network_id: properties
                .virtual_network
                .and_then(|n| n.id)
                .unwrap_or_default(),
            registration_enabled: properties.registration_enabled.unwrap_or(false),
            tags: link.tags.unwrap_or_default(),
            provisioning_state: properties.provisioning_state,
        }
    }
}

/// Request body creating or updating a virtual network link.
#[must_use]
pub fn virtual_network_link_body(link: &VirtualNetworkLink) -> Value {
    json!({
        "location": ZONE_LOCATION_GLOBAL,
        "tags": link.tags,
        "properties": {
            "virtualNetwork": { "id": link.network_id },
            "registrationEnabled": link.registration_enabled,
        },
    })
}

/// Long-running operation status document (`Azure-AsyncOperation` polling).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArmOperationStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<crate::http_errors::ArmErrorDetail>,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
