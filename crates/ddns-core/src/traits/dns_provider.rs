// # DNS Provider Trait
//
// Defines the record-level interface to a DNS provider's API.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
//
// let zone = provider.resolve_zone("home.example.com").await?;
// for record in provider.list_records(&zone, "home.example.com").await? {
//     println!("{} {} {}", record.kind, record.name, record.address);
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

use super::address_source::RecordKind;

/// TTL (seconds) for every record created by this system
pub const MANAGED_TTL: u32 = 60;

/// Comment attached to every record created by this system
pub const MANAGED_COMMENT: &str = "managed by ddns";

/// An A/AAAA record as currently held by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRecord {
    /// Provider-assigned identifier, used only for deletion
    pub id: String,
    /// Record kind
    pub kind: RecordKind,
    /// Record name (the domain)
    pub name: String,
    /// Record content parsed back into an address
    pub address: IpAddr,
}

/// A record to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Record kind, derived from the address
    pub kind: RecordKind,
    /// Record name (the domain)
    pub name: String,
    /// Record content
    pub address: IpAddr,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Management marker
    pub comment: String,
}

impl NewRecord {
    /// A managed record for `address` under `name`
    pub fn managed(name: impl Into<String>, address: IpAddr) -> Self {
        Self {
            kind: RecordKind::of(&address),
            name: name.into(),
            address,
            ttl: MANAGED_TTL,
            comment: MANAGED_COMMENT.to_string(),
        }
    }
}

/// Trait for DNS provider implementations
///
/// Providers expose single-shot record operations. Diffing, ordering and
/// abort-on-failure policy are owned by [`crate::reconcile::Reconciler`].
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Classify failures (authentication, authorization, other)
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Implement retry logic or backoff
/// - ❌ Cache records between calls
/// - ❌ Decide which records to create or delete
///
/// Cancellation is applied by the caller: dropping an in-flight future
/// must abort the underlying request.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Resolve the provider-side zone identifier for a domain
    ///
    /// # Errors
    ///
    /// `Error::ZoneLookup` when no zone matches, or an
    /// authentication/authorization error.
    async fn resolve_zone(&self, domain: &str) -> Result<String, crate::Error>;

    /// List the A and AAAA records held for `domain` in `zone`
    async fn list_records(
        &self,
        zone: &str,
        domain: &str,
    ) -> Result<Vec<ExistingRecord>, crate::Error>;

    /// Delete a record by its identifier
    async fn delete_record(&self, zone: &str, record: &ExistingRecord)
    -> Result<(), crate::Error>;

    /// Create a record, returning it as stored by the provider
    async fn create_record(
        &self,
        zone: &str,
        record: &NewRecord,
    ) -> Result<ExistingRecord, crate::Error>;

    /// Get the provider name (for logging/debugging)
    ///
    /// # Returns
    ///
    /// A static string identifying the provider (e.g., "cloudflare")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_record_uses_fixed_marker() {
        let record = NewRecord::managed("home.example.com", "2001:db8::5".parse().unwrap());

        assert_eq!(record.kind, RecordKind::Aaaa);
        assert_eq!(record.ttl, MANAGED_TTL);
        assert_eq!(record.comment, "managed by ddns");
    }
}
