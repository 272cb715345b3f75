use async_trait::async_trait;
use std::net::IpAddr;
use tokio_util::sync::CancellationToken;

use crate::traits::{AddressSource, Resolution};
use crate::{Error, Result};

/// Address source that always returns one fixed address
///
/// Useful for run-once invocations where the caller already knows the
/// address. Repeating it on a daemon timer converges once and then does
/// nothing, since the answer never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSource {
    address: IpAddr,
}

impl StaticSource {
    /// Parse a literal address
    ///
    /// # Errors
    ///
    /// - `Error::Parse` if `text` is not an IP address
    /// - `Error::InvalidInput` if it is a loopback address
    pub fn parse(text: &str) -> Result<Self> {
        let address: IpAddr = text
            .trim()
            .parse()
            .map_err(|e| Error::parse(format!("unable to parse IP '{}': {}", text, e)))?;
        Self::new(address)
    }

    /// Wrap an already parsed address
    pub fn new(address: IpAddr) -> Result<Self> {
        if address.is_loopback() {
            return Err(Error::invalid_input(format!(
                "loopback address {} cannot be published",
                address
            )));
        }
        Ok(Self { address })
    }

    /// The configured address
    pub fn address(&self) -> IpAddr {
        self.address
    }
}

#[async_trait]
impl AddressSource for StaticSource {
    async fn resolve(&self, _cancel: &CancellationToken) -> Resolution {
        Resolution::ok(vec![self.address])
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
