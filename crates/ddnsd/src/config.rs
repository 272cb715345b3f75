//! Environment configuration for ddnsd
//!
//! Every setting comes from a `DDNS_*` environment variable. Parsing is
//! written against a lookup function so it can be exercised without
//! touching the process environment.

use anyhow::{Context, Result, bail};
use ddns_core::config::{
    AddressSourceConfig, DaemonConfig, DdnsConfig, ProviderConfig, validate_domain_name,
};
use std::env;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Default seconds between daemon cycles
const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub domain: String,
    pub source_type: String,
    pub source_urls: Vec<String>,
    pub source_urls_v6: Vec<String>,
    pub source_interfaces: Vec<String>,
    pub source_address: Option<String>,
    pub provider_type: String,
    api_token: Option<String>,
    pub token_file: PathBuf,
    pub zone_id: Option<String>,
    pub interval_secs: u64,
    pub run_once: bool,
    pub log_level: String,
    pub dry_run: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let interval_secs = match get("DDNS_INTERVAL_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DDNS_INTERVAL_SECS must be a number of seconds. Got: {}", raw))?,
            None => DEFAULT_INTERVAL_SECS,
        };

        let run_once = match get("DDNS_RUN_ONCE") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("DDNS_RUN_ONCE must be true or false. Got: {}", raw))?,
            None => false,
        };

        let token_file = get("DDNS_PROVIDER_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = get("HOME")
                    .or_else(|| get("USERPROFILE"))
                    .unwrap_or_else(|| ".".to_string());
                Path::new(&home).join(".cloudflare")
            });

        Ok(Self {
            domain: get("DDNS_DOMAIN").unwrap_or_default(),
            source_type: get("DDNS_SOURCE_TYPE").unwrap_or_else(|| "interface".to_string()),
            source_urls: split_list(get("DDNS_SOURCE_URLS")),
            source_urls_v6: split_list(get("DDNS_SOURCE_URLS_V6")),
            source_interfaces: split_list(get("DDNS_SOURCE_INTERFACES")),
            source_address: get("DDNS_SOURCE_ADDRESS"),
            provider_type: get("DDNS_PROVIDER_TYPE").unwrap_or_else(|| "cloudflare".to_string()),
            api_token: get("DDNS_PROVIDER_API_TOKEN"),
            token_file,
            zone_id: get("DDNS_PROVIDER_ZONE_ID"),
            interval_secs,
            run_once,
            log_level: get("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            dry_run: get("DDNS_MODE").is_some_and(|m| m.eq_ignore_ascii_case("dry-run")),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            bail!(
                "DDNS_DOMAIN is required. \
                Set it via: export DDNS_DOMAIN=home.example.com"
            );
        }
        validate_domain_name(&self.domain).map_err(|e| anyhow::anyhow!("DDNS_DOMAIN: {}", e))?;

        match self.provider_type.as_str() {
            "cloudflare" => {}
            _ => bail!(
                "DDNS_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: cloudflare",
                self.provider_type
            ),
        }

        match self.source_type.as_str() {
            "interface" => {}
            "web" => {
                if self.source_urls.is_empty() {
                    bail!("DDNS_SOURCE_URLS is required when DDNS_SOURCE_TYPE=web");
                }
            }
            "dual-web" => {
                if self.source_urls.is_empty() || self.source_urls_v6.is_empty() {
                    bail!(
                        "DDNS_SOURCE_URLS and DDNS_SOURCE_URLS_V6 are both required \
                        when DDNS_SOURCE_TYPE=dual-web"
                    );
                }
            }
            "static" => {
                if self.source_address.is_none() {
                    bail!("DDNS_SOURCE_ADDRESS is required when DDNS_SOURCE_TYPE=static");
                }
            }
            _ => bail!(
                "DDNS_SOURCE_TYPE '{}' is not supported. \
                Supported types: interface, web, static, dual-web",
                self.source_type
            ),
        }

        for url in self.source_urls.iter().chain(&self.source_urls_v6) {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                bail!("Lookup URLs must use HTTP or HTTPS scheme. Got: {}", url);
            }
        }

        self.level()?;
        Ok(())
    }

    /// Log level, with `verbose` as an alias for debug
    pub fn level(&self) -> Result<Level> {
        Ok(match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" | "verbose" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, verbose, info, warn, error",
                self.log_level
            ),
        })
    }

    /// The API token, from the environment or the token file
    pub fn api_token(&self) -> Result<String> {
        match &self.api_token {
            Some(token) => Ok(token.clone()),
            None => read_token_file(&self.token_file),
        }
    }

    /// Build the library configuration
    pub fn to_ddns_config(&self, api_token: String) -> DdnsConfig {
        let web = |urls: &[String]| AddressSourceConfig::Web {
            urls: urls.to_vec(),
        };

        let source = match self.source_type.as_str() {
            "web" => web(&self.source_urls),
            "dual-web" => AddressSourceConfig::Join {
                sources: vec![web(&self.source_urls), web(&self.source_urls_v6)],
            },
            "static" => AddressSourceConfig::Static {
                address: self.source_address.clone().unwrap_or_default(),
            },
            _ => AddressSourceConfig::Interface {
                interfaces: self.source_interfaces.clone(),
            },
        };

        DdnsConfig {
            domain: self.domain.clone(),
            source,
            provider: ProviderConfig::Cloudflare {
                api_token,
                zone_id: self.zone_id.clone(),
                dry_run: self.dry_run,
            },
            daemon: DaemonConfig {
                interval_secs: self.interval_secs,
                run_once: self.run_once,
                ..DaemonConfig::default()
            },
        }
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("not a boolean"),
    }
}

/// Read the API token from the first line of `path`
///
/// On unix the file must be readable by its owner only (0600 or 0400).
pub fn read_token_file(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path).with_context(|| {
        format!(
            "API token file {} is not readable. \
            Set DDNS_PROVIDER_API_TOKEN or create the file with mode 0600",
            path.display()
        )
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mode = metadata.permissions().mode() & 0o777;
        if mode != 0o600 && mode != 0o400 {
            bail!(
                "API token file {} has permissions {:o}; expected 600 or 400. \
                Fix with: chmod 600 {}",
                path.display(),
                mode,
                path.display()
            );
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read API token file {}", path.display()))?;
    let token = contents.lines().next().unwrap_or_default().trim().to_string();
    if token.is_empty() {
        bail!("API token file {} is empty", path.display());
    }
    Ok(token)
}
