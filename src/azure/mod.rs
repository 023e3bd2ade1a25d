// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure DNS client facade.
//!
//! [`DnsApi`] is the only seam between the reconcilers and the cloud. Every method is
//! synchronous from the caller's point of view: long-running operations are polled to
//! completion inside the call, and list operations drain all pages.
//!
//! ## Submodules
//!
//! - [`arm`] - Azure Resource Manager REST implementation
//! - [`auth`] - OAuth2 credentials for Resource Manager
//! - [`types`] - Resource Manager wire types

pub mod arm;
pub mod auth;
pub mod types;

#[cfg(test)]
pub mod fake;

use crate::dns_errors::DnsApiError;
use crate::records::{ObservedRecordSet, RecordSet, RecordType};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Facade operation names, used as the `method` metric label and in error messages.
pub mod method {
    pub const GET_ZONE: &str = "GetZone";
    pub const CREATE_OR_UPDATE_ZONE: &str = "CreateOrUpdateZone";
    pub const DELETE_ZONE: &str = "DeleteZone";
    pub const LIST_RECORD_SETS: &str = "ListRecordSets";
    pub const GET_RECORD_SET: &str = "GetRecordSet";
    pub const CREATE_OR_UPDATE_RECORD_SET: &str = "CreateOrUpdateRecordSet";
    pub const DELETE_RECORD_SET: &str = "DeleteRecordSet";
    pub const LIST_VIRTUAL_NETWORK_LINKS: &str = "ListVirtualNetworkLinks";
    pub const CREATE_OR_UPDATE_VIRTUAL_NETWORK_LINK: &str = "CreateOrUpdateVirtualNetworkLink";
    pub const DELETE_VIRTUAL_NETWORK_LINK: &str = "DeleteVirtualNetworkLink";
}

/// Public (Internet-visible) or private (linked virtual networks only) zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ZoneKind {
    Public,
    Private,
}

impl ZoneKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of a zone inside the subscription of a [`DnsApi`] client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ZoneRef {
    pub kind: ZoneKind,
    pub resource_group: String,
    pub fqdn: String,
}

impl ZoneRef {
    #[must_use]
    pub fn public(resource_group: impl Into<String>, fqdn: impl Into<String>) -> Self {
        Self {
            kind: ZoneKind::Public,
            resource_group: resource_group.into(),
            fqdn: fqdn.into(),
        }
    }

    #[must_use]
    pub fn private(resource_group: impl Into<String>, fqdn: impl Into<String>) -> Self {
        Self {
            kind: ZoneKind::Private,
            resource_group: resource_group.into(),
            fqdn: fqdn.into(),
        }
    }
}

impl fmt::Display for ZoneRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} zone {} ({})", self.kind, self.fqdn, self.resource_group)
    }
}

/// A zone as returned by the API.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Zone {
    pub name: String,
    pub location: String,
    /// Authoritative name servers; empty for private zones
    pub name_servers: Vec<String>,
    pub number_of_record_sets: Option<u64>,
    pub tags: BTreeMap<String, String>,
}

/// Association between a private zone and a virtual network.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VirtualNetworkLink {
    pub name: String,
    /// Full resource id of the linked virtual network
    pub network_id: String,
    pub registration_enabled: bool,
    pub tags: BTreeMap<String, String>,
    pub provisioning_state: Option<String>,
}

/// Credentials and subscription of one Azure identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CloudIdentity {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
}

impl fmt::Debug for CloudIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudIdentity")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

/// Typed calls for zones, record sets and virtual network links.
///
/// All calls return [`DnsApiError`]; a missing zone surfaces as `NotFound` with the
/// `ParentResourceNotFound` code on record and link calls.
#[async_trait]
pub trait DnsApi: Send + Sync {
    async fn get_zone(&self, zone: &ZoneRef) -> Result<Zone, DnsApiError>;

    /// Create the zone in location `global`, or update its tags if it exists.
    async fn create_or_update_zone(
        &self,
        zone: &ZoneRef,
        tags: &BTreeMap<String, String>,
    ) -> Result<Zone, DnsApiError>;

    async fn delete_zone(&self, zone: &ZoneRef) -> Result<(), DnsApiError>;

    /// All A, CNAME and NS record sets in the zone; other types are skipped.
    async fn list_record_sets(&self, zone: &ZoneRef)
        -> Result<Vec<ObservedRecordSet>, DnsApiError>;

    async fn get_record_set(
        &self,
        zone: &ZoneRef,
        name: &str,
        record_type: RecordType,
    ) -> Result<ObservedRecordSet, DnsApiError>;

    async fn create_or_update_record_set(
        &self,
        zone: &ZoneRef,
        record: &RecordSet,
    ) -> Result<(), DnsApiError>;

    async fn delete_record_set(
        &self,
        zone: &ZoneRef,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), DnsApiError>;

    async fn list_virtual_network_links(
        &self,
        zone: &ZoneRef,
    ) -> Result<Vec<VirtualNetworkLink>, DnsApiError>;

    async fn create_or_update_virtual_network_link(
        &self,
        zone: &ZoneRef,
        link: &VirtualNetworkLink,
    ) -> Result<(), DnsApiError>;

    async fn delete_virtual_network_link(
        &self,
        zone: &ZoneRef,
        name: &str,
    ) -> Result<(), DnsApiError>;
}

/// Builds a [`DnsApi`] client scoped to one identity and subscription.
pub trait DnsClientFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the client cannot be constructed (e.g. malformed endpoint).
    fn client(&self, identity: &CloudIdentity) -> Result<Arc<dyn DnsApi>, DnsApiError>;
}
