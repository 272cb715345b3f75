// # ddns-core
//
// Core library for keeping a domain's DNS records in step with a host's
// addresses.
//
// ## Architecture Overview
//
// This library provides the core functionality for dynamic DNS updates:
// - **AddressSource**: Trait for determining the desired address set
// - **DnsProvider**: Trait for reading and mutating records via provider APIs
// - **Reconciler**: Diffs desired against existing records and converges them
// - **DdnsEngine**: Runs resolve-then-reconcile once or as a daemon
// - **ProviderRegistry**: Plugin-based registry for sources and providers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Resolution never touches the provider;
//    reconciliation never re-derives the desired set
// 2. **Convergence**: Each cycle leaves the provider set-equal to the desired set
// 3. **Plugin-Based**: Providers and sources are registered, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Stateless**: Nothing is cached between cycles

pub mod config;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod registry;
pub mod sources;
pub mod traits;

// Re-export core types for convenience
pub use config::{AddressSourceConfig, DaemonConfig, DdnsConfig, ProviderConfig};
pub use engine::{DaemonExit, DaemonState, DdnsEngine, EngineEvent};
pub use error::{Error, ErrorList, Result};
pub use reconcile::{ReconcileReport, Reconciler};
pub use registry::ProviderRegistry;
pub use sources::{JoinSource, StaticSource};
pub use traits::{AddressSource, DnsProvider, RecordKind, Resolution};
