//! Configuration types for the DDNS system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest interval the daemon will ever wait between cycles
pub const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Domain whose A/AAAA records are managed (e.g., "home.example.com")
    pub domain: String,

    /// Address source configuration
    pub source: AddressSourceConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Optional daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl DdnsConfig {
    /// Create a new configuration with defaults for everything but the domain
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            source: AddressSourceConfig::default(),
            provider: ProviderConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }

    /// Set the address source
    pub fn with_source(mut self, source: AddressSourceConfig) -> Self {
        self.source = source;
        self
    }

    /// Set the provider
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.provider = provider;
        self
    }

    /// Set the daemon settings
    pub fn with_daemon(mut self, daemon: DaemonConfig) -> Self {
        self.daemon = daemon;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(&self.domain)?;
        self.source.validate()?;
        self.provider.validate()?;
        self.daemon.validate()
    }
}

/// Validate that a string is a usable domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain cannot be empty"));
    }

    if !domain.contains('.') {
        return Err(crate::Error::config(format!(
            "Domain must have at least one dot: '{}'",
            domain
        )));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253)",
            domain.len()
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen: '{}'",
                label
            )));
        }
    }

    Ok(())
}

/// Address source configuration
///
/// This is a closed set: `static` and `join` are built by the core registry,
/// `interface` and `web` by the factories their crates register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AddressSourceConfig {
    /// A single literal address
    Static {
        /// Address text (e.g., "203.0.113.7")
        address: String,
    },

    /// Addresses of local network interfaces
    Interface {
        /// Interfaces to read (empty = every interface)
        #[serde(default)]
        interfaces: Vec<String>,
    },

    /// Public lookup services with quorum agreement
    Web {
        /// Lookup service URLs
        urls: Vec<String>,
    },

    /// Merge the output of several sources
    Join {
        /// Member sources
        sources: Vec<AddressSourceConfig>,
    },
}

impl AddressSourceConfig {
    /// Validate the address source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            AddressSourceConfig::Static { address } => {
                if address.trim().is_empty() {
                    return Err(crate::Error::config("Static address cannot be empty"));
                }
                Ok(())
            }
            AddressSourceConfig::Web { urls } => {
                if urls.is_empty() {
                    return Err(crate::Error::config(
                        "Web address source needs at least one URL",
                    ));
                }
                if urls.iter().any(|u| u.trim().is_empty()) {
                    return Err(crate::Error::config("Web address source URL cannot be empty"));
                }
                Ok(())
            }
            AddressSourceConfig::Join { sources } => {
                if sources.is_empty() {
                    return Err(crate::Error::config(
                        "Join address source needs at least one member",
                    ));
                }
                sources.iter().try_for_each(|s| s.validate())
            }
            AddressSourceConfig::Interface { .. } => Ok(()),
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &'static str {
        match self {
            AddressSourceConfig::Static { .. } => "static",
            AddressSourceConfig::Interface { .. } => "interface",
            AddressSourceConfig::Web { .. } => "web",
            AddressSourceConfig::Join { .. } => "join",
        }
    }
}

impl Default for AddressSourceConfig {
    fn default() -> Self {
        AddressSourceConfig::Interface {
            interfaces: Vec::new(),
        }
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID (optional, can be auto-detected)
        zone_id: Option<String>,
        /// Log mutations instead of performing them
        #[serde(default)]
        dry_run: bool,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Cloudflare {
            api_token: String::new(),
            zone_id: None,
            dry_run: false,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between cycles; anything below [`MIN_INTERVAL`] is raised to it
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Run a single cycle and exit
    #[serde(default)]
    pub run_once: bool,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl DaemonConfig {
    /// Effective interval after applying the one-minute floor
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs).max(MIN_INTERVAL)
    }

    /// Validate the daemon settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_once: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    100
}
