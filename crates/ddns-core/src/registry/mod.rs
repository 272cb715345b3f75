//! Plugin-based provider registry
//!
//! The registry allows DNS providers and address sources to be registered
//! at startup, avoiding hardcoded if-else chains in the daemon.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! let client = reqwest::Client::new();
//!
//! // Plugins share one HTTP client, handed over at construction
//! ddns_ip_http::register(&registry, client.clone());
//! ddns_provider_cloudflare::register(&registry, client);
//!
//! let source = registry.create_source(&config.source)?;
//! let provider = registry.create_provider(&config.provider)?;
//! ```
//!
//! ## Built-in sources
//!
//! `static` and `join` need no platform I/O and are built here directly.
//! `join` members are built recursively through the same registry, so a
//! join can combine any registered source types.

use crate::config::{AddressSourceConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::sources::{JoinSource, StaticSource};
use crate::traits::{AddressSource, AddressSourceFactory, DnsProvider, DnsProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Provider registry for plugin-based source and provider creation
///
/// The registry maintains maps of type names to factory objects,
/// allowing dynamic instantiation based on configuration.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Arc<dyn DnsProviderFactory>>>,

    /// Registered address source factories
    sources: RwLock<HashMap<String, Arc<dyn AddressSourceFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), Arc::from(factory));
    }

    /// Register an address source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "web", "interface")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn AddressSourceFactory>) {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), Arc::from(factory));
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let factory = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create an address source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn AddressSource>)`: Created source instance
    /// - `Err(Error)`: If a source type is not registered or creation fails
    pub fn create_source(&self, config: &AddressSourceConfig) -> Result<Arc<dyn AddressSource>> {
        match config {
            AddressSourceConfig::Static { address } => Ok(Arc::new(StaticSource::parse(address)?)),
            AddressSourceConfig::Join { sources } => {
                let members = sources
                    .iter()
                    .map(|member| self.create_source(member))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Arc::new(JoinSource::new(members)))
            }
            AddressSourceConfig::Interface { .. } | AddressSourceConfig::Web { .. } => {
                let source_type = config.type_name();
                // Clone the factory out so the lock is not held while it runs
                let factory = self
                    .sources
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(source_type)
                    .cloned()
                    .ok_or_else(|| {
                        Error::config(format!("Unknown address source type: {}", source_type))
                    })?;

                factory.create(config)
            }
        }
    }

    /// List all registered provider types
    pub fn provider_types(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered address source types
    ///
    /// The built-in `static` and `join` types are not included.
    pub fn source_types(&self) -> Vec<String> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if an address source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }
}
