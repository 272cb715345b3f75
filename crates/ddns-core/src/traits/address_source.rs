// # Address Source Trait
//
// Defines the interface for determining the set of addresses a domain should
// point at.
//
// ## Implementations
//
// - Literal address: `ddns_core::sources::StaticSource`
// - Combinator: `ddns_core::sources::JoinSource`
// - Public lookup quorum: `ddns-ip-http` crate
// - Local interfaces: `ddns-ip-interface` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressSource;
// use tokio_util::sync::CancellationToken;
//
// let cancel = CancellationToken::new();
// let resolution = source.resolve(&cancel).await;
// for addr in &resolution.addresses {
//     println!("resolved {}", addr);
// }
// if let Some(err) = &resolution.error {
//     eprintln!("partial failure: {}", err);
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;
use tokio_util::sync::CancellationToken;

use crate::Error;

/// DNS record kind derived from an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    /// IPv4 record
    A,
    /// IPv6 record
    Aaaa,
}

impl RecordKind {
    /// Record kind for an address
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => RecordKind::A,
            IpAddr::V6(_) => RecordKind::Aaaa,
        }
    }

    /// Wire name of the record kind
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
        }
    }

    /// Parse a wire name, returning `None` for kinds this system does not manage
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "A" => Some(RecordKind::A),
            "AAAA" => Some(RecordKind::Aaaa),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one resolve call
///
/// Addresses may be present even when an error is also present (partial
/// success). Sources that promise all-or-nothing return no addresses
/// whenever `error` is set.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Resolved addresses, in no particular order
    pub addresses: Vec<IpAddr>,
    /// Aggregated error, if anything went wrong
    pub error: Option<Error>,
}

impl Resolution {
    /// A fully successful resolution
    pub fn ok(addresses: Vec<IpAddr>) -> Self {
        Self {
            addresses,
            error: None,
        }
    }

    /// A failed resolution with no addresses
    pub fn failed(error: Error) -> Self {
        Self {
            addresses: Vec::new(),
            error: Some(error),
        }
    }

    /// Addresses alongside whatever errors occurred
    pub fn partial(addresses: Vec<IpAddr>, errors: Vec<Error>) -> Self {
        Self {
            addresses,
            error: Error::join(errors),
        }
    }

    /// Whether the resolution carries no error
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Collapse into a `Result`, discarding partial addresses on error
    pub fn into_result(self) -> Result<Vec<IpAddr>, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.addresses),
        }
    }
}

/// Trait for address source implementations
///
/// A source is configured once and then resolved any number of times,
/// sequentially or concurrently. Implementations hold no mutable state
/// between calls other than a shared HTTP transport.
///
/// # Contract
///
/// - Never include loopback addresses in the result
/// - Honour `cancel`: once it fires, stop waiting and return promptly
/// - Never touch the DNS provider
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Determine the current address set
    async fn resolve(&self, cancel: &CancellationToken) -> Resolution;

    /// Short name for logging
    fn name(&self) -> &'static str;
}

/// Helper trait for constructing address sources from configuration
pub trait AddressSourceFactory: Send + Sync {
    /// Create an AddressSource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this source type
    ///
    /// # Returns
    ///
    /// A shareable AddressSource trait object
    fn create(
        &self,
        config: &crate::config::AddressSourceConfig,
    ) -> Result<std::sync::Arc<dyn AddressSource>, crate::Error>;
}
