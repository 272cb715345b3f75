// # Interface Address Source
//
// This crate provides the local-interface address source for the DDNS
// system.
//
// ## Purpose
//
// Hosts with a public address configured directly on a NIC (no NAT) can
// read their addresses locally instead of asking public lookup endpoints.
//
// ## Behavior
//
// - Enumerates interface addresses with `getifaddrs(3)` via `nix`
// - Restricts to the named interfaces, or uses all of them if none are named
// - Skips loopback addresses and non-IP families
// - Reports malformed entries and missing interfaces as non-fatal errors
//   next to whatever addresses were found (partial success)
//
// ## Platform Support
//
// Enumeration needs a unix platform; elsewhere every resolution fails
// with a configuration error.

use ddns_core::ProviderRegistry;
use ddns_core::config::AddressSourceConfig;
use ddns_core::traits::{AddressSource, AddressSourceFactory, Resolution};
use ddns_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Address attached to an interface, as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawAddress {
    /// An IPv4 address
    V4(Ipv4Addr),
    /// An IPv6 address
    V6(Ipv6Addr),
    /// An inet-family entry that could not be decoded
    Malformed(String),
    /// Link-layer or other non-IP entry
    NotIp,
}

/// One interface/address pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    /// Interface name, e.g. `eth0`
    pub interface: String,
    /// The address
    pub address: RawAddress,
}

/// Pick usable addresses out of an interface listing
///
/// `wanted` restricts the interfaces considered; an empty slice means all.
/// Returns the addresses found and the non-fatal errors encountered.
pub fn select_addresses(
    entries: &[InterfaceAddress],
    wanted: &[String],
) -> (Vec<IpAddr>, Vec<Error>) {
    let mut addresses = Vec::new();
    let mut errors = Vec::new();

    for entry in entries {
        if !wanted.is_empty() && !wanted.contains(&entry.interface) {
            continue;
        }

        let addr = match &entry.address {
            RawAddress::V4(a) => IpAddr::V4(*a),
            RawAddress::V6(a) => IpAddr::V6(*a),
            RawAddress::Malformed(detail) => {
                warn!("Malformed address on {}: {}", entry.interface, detail);
                errors.push(Error::parse(format!(
                    "malformed address on interface {}: {}",
                    entry.interface, detail
                )));
                continue;
            }
            RawAddress::NotIp => continue,
        };

        if addr.is_loopback() {
            continue;
        }
        debug!("Found {} on {}", addr, entry.interface);
        addresses.push(addr);
    }

    for name in wanted {
        if !entries.iter().any(|e| &e.interface == name) {
            errors.push(Error::invalid_input(format!("interface {} not found", name)));
        }
    }

    (addresses, errors)
}

/// Address source reading local interface addresses
#[derive(Debug, Clone, Default)]
pub struct InterfaceSource {
    /// Interfaces to read; empty means all
    interfaces: Vec<String>,
}

impl InterfaceSource {
    /// Create a source over `interfaces` (empty for all)
    pub fn new(interfaces: Vec<String>) -> Self {
        Self { interfaces }
    }

    /// Configured interface names
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }
}

#[async_trait::async_trait]
impl AddressSource for InterfaceSource {
    async fn resolve(&self, cancel: &CancellationToken) -> Resolution {
        if cancel.is_cancelled() {
            return Resolution::failed(Error::Cancelled);
        }

        // getifaddrs blocks; keep it off the async workers
        let listing = match tokio::task::spawn_blocking(enumerate).await {
            Ok(listing) => listing,
            Err(e) => Err(Error::Other(format!("interface enumeration task failed: {}", e))),
        };

        match listing {
            Ok(entries) => {
                let (addresses, errors) = select_addresses(&entries, &self.interfaces);
                Resolution::partial(addresses, errors)
            }
            Err(e) => Resolution::failed(e),
        }
    }

    fn name(&self) -> &'static str {
        "interface"
    }
}

#[cfg(unix)]
fn enumerate() -> Result<Vec<InterfaceAddress>> {
    use nix::ifaddrs::getifaddrs;
    use nix::sys::socket::{AddressFamily, SockaddrLike, SockaddrStorage};
    use std::net::{SocketAddrV4, SocketAddrV6};

    fn classify(storage: &SockaddrStorage) -> RawAddress {
        if let Some(v4) = storage.as_sockaddr_in() {
            return RawAddress::V4(*SocketAddrV4::from(*v4).ip());
        }
        if let Some(v6) = storage.as_sockaddr_in6() {
            return RawAddress::V6(*SocketAddrV6::from(*v6).ip());
        }
        match storage.family() {
            Some(family @ (AddressFamily::Inet | AddressFamily::Inet6)) => {
                RawAddress::Malformed(format!("{:?} entry of {} bytes", family, storage.len()))
            }
            _ => RawAddress::NotIp,
        }
    }

    let listing = getifaddrs().map_err(|e| Error::Network(std::io::Error::from(e)))?;

    Ok(listing
        .map(|ifa| InterfaceAddress {
            address: ifa
                .address
                .as_ref()
                .map(classify)
                .unwrap_or(RawAddress::NotIp),
            interface: ifa.interface_name,
        })
        .collect())
}

#[cfg(not(unix))]
fn enumerate() -> Result<Vec<InterfaceAddress>> {
    Err(Error::config(
        "Interface address source is only available on unix platforms",
    ))
}

/// Factory for creating interface sources
pub struct InterfaceFactory;

impl AddressSourceFactory for InterfaceFactory {
    fn create(&self, config: &AddressSourceConfig) -> Result<Arc<dyn AddressSource>> {
        match config {
            AddressSourceConfig::Interface { interfaces } => {
                Ok(Arc::new(InterfaceSource::new(interfaces.clone())))
            }
            _ => Err(Error::config("Invalid config for interface address source")),
        }
    }
}

/// Register the interface address source with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_source("interface", Box::new(InterfaceFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(interface: &str, address: RawAddress) -> InterfaceAddress {
        InterfaceAddress {
            interface: interface.to_string(),
            address,
        }
    }

    fn listing() -> Vec<InterfaceAddress> {
        vec![
            entry("lo", RawAddress::V4(Ipv4Addr::LOCALHOST)),
            entry("lo", RawAddress::V6(Ipv6Addr::LOCALHOST)),
            entry("eth0", RawAddress::NotIp),
            entry("eth0", RawAddress::V4(Ipv4Addr::new(192, 168, 86, 253))),
            entry("eth0", RawAddress::V6("fd64:9f44:fc30::a227".parse().unwrap())),
            entry("wlan0", RawAddress::V4(Ipv4Addr::new(10, 0, 0, 7))),
        ]
    }

    #[test]
    fn all_interfaces_without_loopback() {
        let (addrs, errors) = select_addresses(&listing(), &[]);

        assert!(errors.is_empty());
        assert_eq!(addrs.len(), 3);
        assert!(addrs.iter().all(|a| !a.is_loopback()));
    }

    #[test]
    fn named_interfaces_only() {
        let (addrs, errors) = select_addresses(&listing(), &["wlan0".to_string()]);

        assert!(errors.is_empty());
        assert_eq!(addrs, vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7))]);
    }

    #[test]
    fn malformed_entries_are_partial_failures() {
        let mut entries = listing();
        entries.push(entry("eth0", RawAddress::Malformed("Inet entry of 4 bytes".into())));

        let (addrs, errors) = select_addresses(&entries, &["eth0".to_string()]);

        assert_eq!(addrs.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::Parse(_)));
    }

    #[test]
    fn missing_interface_is_reported() {
        let wanted = vec!["eth0".to_string(), "ppp0".to_string()];
        let (addrs, errors) = select_addresses(&listing(), &wanted);

        assert_eq!(addrs.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("ppp0"));
    }

    #[test]
    fn loopback_only_interface_yields_nothing() {
        let (addrs, errors) = select_addresses(&listing(), &["lo".to_string()]);

        assert!(addrs.is_empty());
        assert!(errors.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolves_host_interfaces() {
        let res = InterfaceSource::default()
            .resolve(&CancellationToken::new())
            .await;

        assert!(res.addresses.iter().all(|a| !a.is_loopback()));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn missing_interface_is_reported_from_blocking_enumeration() {
        let res = InterfaceSource::new(vec!["ddns-missing0".to_string()])
            .resolve(&CancellationToken::new())
            .await;

        assert!(res.addresses.is_empty());
        let message = res.error.map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("interface ddns-missing0 not found"), "{}", message);
    }

    #[tokio::test]
    async fn cancelled_resolution_returns_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let res = InterfaceSource::default().resolve(&cancel).await;
        assert!(res.addresses.is_empty());
        assert!(matches!(res.error, Some(Error::Cancelled)));
    }

    #[test]
    fn factory_and_registration() {
        let config = AddressSourceConfig::Interface {
            interfaces: vec!["eth0".to_string()],
        };
        assert_eq!(InterfaceFactory.create(&config).unwrap().name(), "interface");

        let registry = ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_source("interface"));
    }
}
