// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Azure Resource Manager REST implementation of [`DnsApi`].
//!
//! Resource paths:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Network/dnsZones/{zone}
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.Network/privateDnsZones/{zone}
//!     /{TYPE}/{name}                record set
//!     /recordsets  |  /ALL          record set list (public | private)
//!     /virtualNetworkLinks/{name}   private zone link
//! ```
//!
//! Transient failures are retried with [`http_backoff`]; `202 Accepted` responses are polled
//! through `Azure-AsyncOperation` or `Location` until the operation completes.

use super::auth::{ClientSecretCredential, TokenCredential};
use super::types::{
    record_set_body, virtual_network_link_body, zone_body, ArmOperationStatus, ArmRecordSet,
    ArmVirtualNetworkLink, ArmZone,
};
use super::{
    method, CloudIdentity, DnsApi, DnsClientFactory, VirtualNetworkLink, Zone, ZoneKind, ZoneRef,
};
use crate::constants::{
    ARM_HTTP_TIMEOUT_SECS, LRO_DEFAULT_POLL_INTERVAL_SECS, LRO_MAX_POLL_INTERVAL_SECS,
    PRIVATE_DNS_API_VERSION, PUBLIC_DNS_API_VERSION,
};
use crate::dns_errors::DnsApiError;
use crate::http_errors::{classify_connection_error, classify_http_error};
use crate::metrics;
use crate::reconcilers::pagination::{list_all_arm_pages, ArmPage};
use crate::reconcilers::retry::{http_backoff, retry_cloud_call};
use crate::records::{ObservedRecordSet, RecordSet, RecordType};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const AZURE_ASYNC_OPERATION: &str = "azure-asyncoperation";
const LOCATION: &str = "location";

/// A successful (2xx) Resource Manager response.
struct ArmResponse {
    status: u16,
    headers: HeaderMap,
    body: String,
}

impl ArmResponse {
    fn header_url(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn retry_after(&self) -> Option<Duration> {
        let secs: u64 = self.headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
        Some(Duration::from_secs(secs.min(LRO_MAX_POLL_INTERVAL_SECS)))
    }
}

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, DnsApiError> {
    serde_json::from_str(body).map_err(|e| DnsApiError::Decode {
        message: format!("{what}: {e}"),
    })
}

fn invalid_endpoint(endpoint: &str) -> DnsApiError {
    DnsApiError::Rejected {
        status: 0,
        code: "InvalidEndpoint".to_string(),
        message: format!("'{endpoint}' is not a usable Resource Manager endpoint"),
    }
}

/// [`DnsApi`] client for one subscription.
pub struct ArmDnsClient {
    http: reqwest::Client,
    endpoint: Url,
    subscription_id: String,
    credential: Arc<dyn TokenCredential>,
    poll_interval: Duration,
}

impl ArmDnsClient {
    /// # Errors
    ///
    /// Returns an error if `endpoint` is not an absolute http(s) URL.
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        subscription_id: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self, DnsApiError> {
        let endpoint = Url::parse(endpoint).map_err(|_| invalid_endpoint(endpoint))?;
        if endpoint.cannot_be_a_base() {
            return Err(invalid_endpoint(endpoint.as_str()));
        }
        Ok(Self {
            http,
            endpoint,
            subscription_id: subscription_id.into(),
            credential,
            poll_interval: Duration::from_secs(LRO_DEFAULT_POLL_INTERVAL_SECS),
        })
    }

    /// Override the long-running operation poll interval used without `Retry-After`.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn zone_url(&self, zone: &ZoneRef, children: &[&str]) -> Result<Url, DnsApiError> {
        let (provider, api_version) = match zone.kind {
            ZoneKind::Public => ("dnsZones", PUBLIC_DNS_API_VERSION),
            ZoneKind::Private => ("privateDnsZones", PRIVATE_DNS_API_VERSION),
        };

        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| invalid_endpoint(self.endpoint.as_str()))?
            .pop_if_empty()
            .extend([
                "subscriptions",
                self.subscription_id.as_str(),
                "resourceGroups",
                zone.resource_group.as_str(),
                "providers",
                "Microsoft.Network",
                provider,
                zone.fqdn.as_str(),
            ])
            .extend(children);
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    /// One HTTP attempt. Non-2xx responses are classified into errors.
    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<ArmResponse, DnsApiError> {
        let token = self.credential.token().await?;
        let resource = url.path().to_string();

        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_connection_error(&e))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| classify_connection_error(&e))?;

        if !(200..300).contains(&status) {
            return Err(classify_http_error(status, &resource, &body));
        }

        Ok(ArmResponse {
            status,
            headers,
            body,
        })
    }

    /// One request with transient retries.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<ArmResponse, DnsApiError> {
        let operation = format!("{method} {}", url.path());
        retry_cloud_call(
            http_backoff(),
            move || self.send_once(method.clone(), url.clone(), body),
            &operation,
        )
        .await
    }

    /// One request, polled to completion when the service accepts it asynchronously.
    ///
    /// Returns the final resource body when the service supplied one.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Option<Value>, DnsApiError> {
        let response = self.send(method, url, body).await?;
        if response.status == 202 {
            return self.poll_long_running(&response).await;
        }
        if response.body.trim().is_empty() {
            return Ok(None);
        }
        decode(&response.body, "response body").map(Some)
    }

    async fn poll_long_running(
        &self,
        accepted: &ArmResponse,
    ) -> Result<Option<Value>, DnsApiError> {
        let mut delay = accepted.retry_after().unwrap_or(self.poll_interval);

        if let Some(operation_url) = accepted.header_url(AZURE_ASYNC_OPERATION) {
            let operation_url = Url::parse(&operation_url).map_err(|e| DnsApiError::Decode {
                message: format!("Azure-AsyncOperation header: {e}"),
            })?;
            loop {
                tokio::time::sleep(delay).await;
                let response = self.send(Method::GET, operation_url.clone(), None).await?;
                let status: ArmOperationStatus = decode(&response.body, "operation status")?;
                match status.status.as_deref().map(str::to_ascii_lowercase).as_deref() {
                    Some("succeeded") => return Ok(None),
                    Some(terminal @ ("failed" | "canceled")) => {
                        let detail = status.error.unwrap_or_default();
                        return Err(DnsApiError::Rejected {
                            status: accepted.status,
                            code: detail.code.unwrap_or_else(|| terminal.to_string()),
                            message: detail
                                .message
                                .unwrap_or_else(|| format!("long-running operation {terminal}")),
                        });
                    }
                    _ => {
                        debug!(operation = %operation_url, "Long-running operation in progress");
                        delay = response.retry_after().unwrap_or(self.poll_interval);
                    }
                }
            }
        }

        if let Some(location) = accepted.header_url(LOCATION) {
            let location = Url::parse(&location).map_err(|e| DnsApiError::Decode {
                message: format!("Location header: {e}"),
            })?;
            loop {
                tokio::time::sleep(delay).await;
                let response = self.send(Method::GET, location.clone(), None).await?;
                if response.status != 202 {
                    if response.body.trim().is_empty() {
                        return Ok(None);
                    }
                    return decode(&response.body, "response body").map(Some);
                }
                delay = response.retry_after().unwrap_or(self.poll_interval);
            }
        }

        warn!("202 Accepted without a polling header, assuming completion");
        Ok(None)
    }

    async fn list_pages<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>, DnsApiError> {
        list_all_arm_pages(first.to_string(), |next| async move {
            let url = Url::parse(&next).map_err(|e| DnsApiError::Decode {
                message: format!("nextLink: {e}"),
            })?;
            let response = self.send(Method::GET, url, None).await?;
            decode::<ArmPage<T>>(&response.body, "list page")
        })
        .await
    }

    async fn instrumented<T, Fut>(&self, method: &'static str, call: Fut) -> Result<T, DnsApiError>
    where
        Fut: Future<Output = Result<T, DnsApiError>>,
    {
        metrics::record_api_request(method);
        let result = call.await;
        if let Err(e) = &result {
            metrics::record_api_error(method);
            debug!(method, error = %e, "Azure DNS call failed");
        }
        result
    }
}

#[async_trait]
impl DnsApi for ArmDnsClient {
    async fn get_zone(&self, zone: &ZoneRef) -> Result<Zone, DnsApiError> {
        self.instrumented(method::GET_ZONE, async {
            let url = self.zone_url(zone, &[])?;
            let response = self.send(Method::GET, url, None).await?;
            decode::<ArmZone>(&response.body, "zone").map(Zone::from)
        })
        .await
    }

    async fn create_or_update_zone(
        &self,
        zone: &ZoneRef,
        tags: &BTreeMap<String, String>,
    ) -> Result<Zone, DnsApiError> {
        self.instrumented(method::CREATE_OR_UPDATE_ZONE, async {
            let url = self.zone_url(zone, &[])?;
            let body = zone_body(zone.kind, tags);
            match self.execute(Method::PUT, url.clone(), Some(&body)).await? {
                Some(value) => serde_json::from_value::<ArmZone>(value)
                    .map(Zone::from)
                    .map_err(|e| DnsApiError::Decode {
                        message: format!("zone: {e}"),
                    }),
                None => {
                    let response = self.send(Method::GET, url, None).await?;
                    decode::<ArmZone>(&response.body, "zone").map(Zone::from)
                }
            }
        })
        .await
    }

    async fn delete_zone(&self, zone: &ZoneRef) -> Result<(), DnsApiError> {
        self.instrumented(method::DELETE_ZONE, async {
            let url = self.zone_url(zone, &[])?;
            self.execute(Method::DELETE, url, None).await.map(|_| ())
        })
        .await
    }

    async fn list_record_sets(
        &self,
        zone: &ZoneRef,
    ) -> Result<Vec<ObservedRecordSet>, DnsApiError> {
        self.instrumented(method::LIST_RECORD_SETS, async {
            let collection = match zone.kind {
                ZoneKind::Public => "recordsets",
                ZoneKind::Private => "ALL",
            };
            let url = self.zone_url(zone, &[collection])?;
            let records: Vec<ArmRecordSet> = self.list_pages(url).await?;
            Ok(records
                .into_iter()
                .filter_map(ArmRecordSet::into_observed)
                .collect())
        })
        .await
    }

    async fn get_record_set(
        &self,
        zone: &ZoneRef,
        name: &str,
        record_type: RecordType,
    ) -> Result<ObservedRecordSet, DnsApiError> {
        self.instrumented(method::GET_RECORD_SET, async {
            let url = self.zone_url(zone, &[record_type.as_str(), name])?;
            let response = self.send(Method::GET, url, None).await?;
            decode::<ArmRecordSet>(&response.body, "record set")?
                .into_observed()
                .ok_or_else(|| DnsApiError::Decode {
                    message: format!("record set {name} has no {record_type} type"),
                })
        })
        .await
    }

    async fn create_or_update_record_set(
        &self,
        zone: &ZoneRef,
        record: &RecordSet,
    ) -> Result<(), DnsApiError> {
        self.instrumented(method::CREATE_OR_UPDATE_RECORD_SET, async {
            let url = self.zone_url(zone, &[record.record_type().as_str(), record.name.as_str()])?;
            let body = record_set_body(zone.kind, record);
            self.execute(Method::PUT, url, Some(&body)).await.map(|_| ())
        })
        .await
    }

    async fn delete_record_set(
        &self,
        zone: &ZoneRef,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), DnsApiError> {
        self.instrumented(method::DELETE_RECORD_SET, async {
            let url = self.zone_url(zone, &[record_type.as_str(), name])?;
            self.execute(Method::DELETE, url, None).await.map(|_| ())
        })
        .await
    }

    async fn list_virtual_network_links(
        &self,
        zone: &ZoneRef,
    ) -> Result<Vec<VirtualNetworkLink>, DnsApiError> {
        self.instrumented(method::LIST_VIRTUAL_NETWORK_LINKS, async {
            let url = self.zone_url(zone, &["virtualNetworkLinks"])?;
            let links: Vec<ArmVirtualNetworkLink> = self.list_pages(url).await?;
            Ok(links.into_iter().map(VirtualNetworkLink::from).collect())
        })
        .await
    }

    async fn create_or_update_virtual_network_link(
        &self,
        zone: &ZoneRef,
        link: &VirtualNetworkLink,
    ) -> Result<(), DnsApiError> {
        self.instrumented(method::CREATE_OR_UPDATE_VIRTUAL_NETWORK_LINK, async {
            let url = self.zone_url(zone, &["virtualNetworkLinks", link.name.as_str()])?;
            let body = virtual_network_link_body(link);
            self.execute(Method::PUT, url, Some(&body)).await.map(|_| ())
        })
        .await
    }

    async fn delete_virtual_network_link(
        &self,
        zone: &ZoneRef,
        name: &str,
    ) -> Result<(), DnsApiError> {
        self.instrumented(method::DELETE_VIRTUAL_NETWORK_LINK, async {
            let url = self.zone_url(zone, &["virtualNetworkLinks", name])?;
            self.execute(Method::DELETE, url, None).await.map(|_| ())
        })
        .await
    }
}

/// Builds [`ArmDnsClient`]s, sharing one HTTP client and caching credentials per identity.
pub struct ArmClientFactory {
    http: reqwest::Client,
    endpoint: String,
    authority_host: String,
    credentials: Mutex<HashMap<(String, String), Arc<ClientSecretCredential>>>,
}

impl ArmClientFactory {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        authority_host: impl Into<String>,
    ) -> Result<Self, DnsApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(ARM_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| classify_connection_error(&e))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            authority_host: authority_host.into(),
            credentials: Mutex::new(HashMap::new()),
        })
    }

    fn credential(&self, identity: &CloudIdentity) -> Arc<ClientSecretCredential> {
        let key = (identity.tenant_id.clone(), identity.client_id.clone());
        let mut credentials = self
            .credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = credentials.get(&key) {
            if existing.uses_secret(&identity.client_secret) {
                return Arc::clone(existing);
            }
        }

        let credential = Arc::new(ClientSecretCredential::new(
            self.http.clone(),
            self.authority_host.clone(),
            identity.tenant_id.clone(),
            identity.client_id.clone(),
            identity.client_secret.clone(),
        ));
        credentials.insert(key, Arc::clone(&credential));
        credential
    }
}

impl DnsClientFactory for ArmClientFactory {
    fn client(&self, identity: &CloudIdentity) -> Result<Arc<dyn DnsApi>, DnsApiError> {
        let credential: Arc<dyn TokenCredential> = self.credential(identity);
        let client = ArmDnsClient::new(
            self.http.clone(),
            &self.endpoint,
            identity.subscription_id.clone(),
            credential,
        )?;
        Ok(Arc::new(client))
    }
}
