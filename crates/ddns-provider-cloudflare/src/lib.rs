// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS system.
//
// ## Architectural Constraints
//
// ### Trust Level: Untrusted (DNS Provider)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
// - ✅ Parse provider-specific responses
// - ✅ Classify failures (authentication, authorization, rate limiting)
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic
// - ❌ Decide which records to create or delete (owned by Reconciler)
// - ❌ Cache state beyond single request
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&page=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::traits::{
    DnsProvider, DnsProviderFactory, ExistingRecord, NewRecord, RecordKind,
};
use ddns_core::{Error, ProviderRegistry, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Records requested per listing page
const RECORDS_PER_PAGE: u32 = 100;

/// Cloudflare API error codes that mean the token itself is bad
const INVALID_TOKEN_CODES: &[i64] = &[9109, 10000];

/// Standard Cloudflare v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    name: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct CreateRecord<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    content: String,
    ttl: u32,
    comment: &'a str,
}

/// What a request was doing, for status classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    ZoneLookup,
    Read,
    Mutation,
}

fn describe(errors: &[ApiMessage]) -> String {
    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map a failed response to an error
fn classify(status: StatusCode, op: Operation, errors: &[ApiMessage], body: &str) -> Error {
    let detail = if errors.is_empty() {
        body.trim().to_string()
    } else {
        describe(errors)
    };

    match status {
        StatusCode::UNAUTHORIZED => {
            Error::auth(format!("Invalid API token. Status: {} - {}", status, detail))
        }
        StatusCode::FORBIDDEN => Error::forbidden(format!(
            "API token lacks permission for this action. Status: {} - {}",
            status, detail
        )),
        _ if errors.iter().any(|e| INVALID_TOKEN_CODES.contains(&e.code)) => {
            Error::auth(format!("Invalid API token. Status: {} - {}", status, detail))
        }
        StatusCode::NOT_FOUND if op == Operation::ZoneLookup => {
            Error::zone_lookup(format!("Zone not found. Status: {} - {}", status, detail))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            Error::rate_limited(format!("Rate limit exceeded. Status: {}", status))
        }
        _ if op == Operation::Mutation => {
            Error::mutation(format!("{} - {}", status, detail))
        }
        _ => Error::provider("cloudflare", format!("{} - {}", status, detail)),
    }
}

/// Candidate zone names for `domain`, longest first, down to its last two labels
fn zone_candidates(domain: &str) -> Vec<String> {
    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    if labels.len() < 2 {
        return Vec::new();
    }
    (0..=labels.len() - 2).map(|i| labels[i..].join(".")).collect()
}

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated, stateless, and single-shot. Deciding which
/// records to create or delete is owned by the reconciler.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended POST/DELETE
/// - **NOT** actually modify DNS records
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone ID (optional, auto-detected from the domain when absent)
    zone_id: Option<String>,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// API root, overridable for tests
    base_url: String,

    /// Dry-run mode: if true, perform GET requests but skip mutations
    dry_run: bool,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Optional zone ID (auto-detected when `None`)
    /// - `dry_run`: If true, perform GET requests but skip mutations
    ///
    /// # Errors
    ///
    /// `Error::Config` if the token is empty.
    pub fn new(api_token: impl Into<String>, zone_id: Option<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        Ok(Self {
            api_token,
            zone_id: zone_id.filter(|z| !z.is_empty()),
            client: reqwest::Client::new(),
            base_url: CLOUDFLARE_API_BASE.to_string(),
            dry_run,
        })
    }

    /// Use a shared HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether mutations are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send a request and decode the envelope's result
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        op: Operation,
    ) -> Result<(Option<T>, Option<ResultInfo>)> {
        let response = request
            .bearer_auth(&self.api_token)
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read Cloudflare response: {}", e)))?;

        let envelope: Option<Envelope<T>> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let errors = envelope.map(|e| e.errors).unwrap_or_default();
            return Err(classify(status, op, &errors, &body));
        }

        let envelope = envelope.ok_or_else(|| {
            Error::provider("cloudflare", format!("Invalid response format: {}", body.trim()))
        })?;

        if !envelope.success {
            if envelope.errors.iter().any(|e| INVALID_TOKEN_CODES.contains(&e.code)) {
                return Err(Error::auth(describe(&envelope.errors)));
            }
            return Err(Error::provider(
                "cloudflare",
                format!("API reported failure: {}", describe(&envelope.errors)),
            ));
        }

        Ok((envelope.result, envelope.result_info))
    }

    async fn find_zone(&self, zone_name: &str) -> Result<Option<String>> {
        tracing::debug!("Looking up zone ID for {}", zone_name);

        let request = self
            .client
            .get(format!("{}/zones", self.base_url))
            .query(&[("name", zone_name)]);

        let (zones, _) = self.call::<Vec<Zone>>(request, Operation::ZoneLookup).await?;
        Ok(zones.unwrap_or_default().into_iter().next().map(|z| z.id))
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Resolve the zone ID for `domain`
    ///
    /// A configured zone ID is returned as-is. Otherwise zone names are
    /// tried from the domain itself down to its last two labels, so
    /// delegated subzones and multi-label suffixes are found.
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn resolve_zone(&self, domain: &str) -> Result<String> {
        if let Some(ref zone_id) = self.zone_id {
            tracing::debug!("Using pre-configured zone ID");
            return Ok(zone_id.clone());
        }

        let candidates = zone_candidates(domain);
        if candidates.is_empty() {
            return Err(Error::zone_lookup(format!("Invalid domain name: {}", domain)));
        }

        for candidate in &candidates {
            match self.find_zone(candidate).await {
                Ok(Some(id)) => {
                    tracing::debug!("Found zone ID for {}: {}", candidate, id);
                    return Ok(id);
                }
                Ok(None) | Err(Error::ZoneLookup(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::zone_lookup(format!(
            "no Cloudflare zone found for {} (tried {})",
            domain,
            candidates.join(", ")
        )))
    }

    /// List A and AAAA records, following pagination
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=home.example.com&per_page=100&page=1
    /// Authorization: Bearer <token>
    /// ```
    async fn list_records(&self, zone: &str, domain: &str) -> Result<Vec<ExistingRecord>> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone);
        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            let request = self.client.get(&url).query(&[
                ("name", domain.to_string()),
                ("per_page", RECORDS_PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let (batch, info) = self.call::<Vec<DnsRecord>>(request, Operation::Read).await?;

            for record in batch.unwrap_or_default() {
                let Some(kind) = RecordKind::from_wire(&record.kind) else {
                    continue;
                };
                let address: IpAddr = record.content.parse().map_err(|_| {
                    Error::parse(format!(
                        "record {} has content {:?}, which is not an IP address",
                        record.id, record.content
                    ))
                })?;
                records.push(ExistingRecord {
                    id: record.id,
                    kind,
                    name: record.name,
                    address,
                });
            }

            let total_pages = info.map(|i| i.total_pages).unwrap_or(1);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Found {} A/AAAA record(s) for {}", records.len(), domain);
        Ok(records)
    }

    /// Delete a record (skipped in dry-run mode)
    ///
    /// # API Call
    ///
    /// ```http
    /// DELETE /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn delete_record(&self, zone: &str, record: &ExistingRecord) -> Result<()> {
        let url = format!("{}/zones/{}/dns_records/{}", self.base_url, zone, record.id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send DELETE to {} ({} {})",
                url,
                record.kind,
                record.address
            );
            return Ok(());
        }

        self.call::<serde_json::Value>(self.client.delete(&url), Operation::Mutation)
            .await?;
        tracing::info!("Deleted {} record {} for {}", record.kind, record.address, record.name);
        Ok(())
    }

    /// Create a record (skipped in dry-run mode)
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {
    ///   "type": "A",
    ///   "name": "home.example.com",
    ///   "content": "1.2.3.4",
    ///   "ttl": 60,
    ///   "comment": "managed by ddns"
    /// }
    /// ```
    async fn create_record(&self, zone: &str, record: &NewRecord) -> Result<ExistingRecord> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone);
        let payload = CreateRecord {
            kind: record.kind.as_str(),
            name: &record.name,
            content: record.address.to_string(),
            ttl: record.ttl,
            comment: &record.comment,
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(ExistingRecord {
                id: "dry-run".to_string(),
                kind: record.kind,
                name: record.name.clone(),
                address: record.address,
            });
        }

        let (created, _) = self
            .call::<DnsRecord>(self.client.post(&url).json(&payload), Operation::Mutation)
            .await?;
        let created = created.ok_or_else(|| {
            Error::provider("cloudflare", "Invalid response format: missing created record")
        })?;

        tracing::info!("Created {} record {} for {}", record.kind, record.address, record.name);
        Ok(ExistingRecord {
            id: created.id,
            kind: record.kind,
            name: created.name,
            address: record.address,
        })
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory {
    client: reqwest::Client,
}

impl CloudflareFactory {
    /// Factory whose providers share `client`
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for CloudflareFactory {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new())
    }
}

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(
                    CloudflareProvider::new(api_token.clone(), zone_id.clone(), *dry_run)?
                        .with_client(self.client.clone()),
                ))
            }
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_cloudflare::register(&registry, reqwest::Client::new());
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ProviderRegistry, client: reqwest::Client) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory::with_client(client)));
}
