//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressSource`]: Determine the desired address set
//! - [`DnsProvider`]: Read and mutate records via provider APIs

pub mod address_source;
pub mod dns_provider;

pub use address_source::{AddressSource, AddressSourceFactory, RecordKind, Resolution};
pub use dns_provider::{
    DnsProvider, DnsProviderFactory, ExistingRecord, MANAGED_COMMENT, MANAGED_TTL, NewRecord,
};
