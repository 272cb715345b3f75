use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::traits::{AddressSource, Resolution};

/// Combines the output of several address sources into one
///
/// Typical use is pairing an IPv4-only and an IPv6-only lookup so both
/// record kinds get published.
///
/// Every member runs concurrently and to completion. All addresses are
/// concatenated (duplicates are left for the consumer to drop) and all
/// errors are joined. One member failing never hides another member's
/// addresses.
#[derive(Clone)]
pub struct JoinSource {
    sources: Vec<Arc<dyn AddressSource>>,
}

impl JoinSource {
    /// Create a join over `sources`
    pub fn new(sources: Vec<Arc<dyn AddressSource>>) -> Self {
        Self { sources }
    }

    /// Number of member sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if there are no member sources
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for JoinSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinSource")
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[async_trait]
impl AddressSource for JoinSource {
    async fn resolve(&self, cancel: &CancellationToken) -> Resolution {
        let mut tasks = JoinSet::new();
        for source in &self.sources {
            let source = Arc::clone(source);
            let cancel = cancel.clone();
            tasks.spawn(async move { source.resolve(&cancel).await });
        }

        let mut addresses = Vec::new();
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(res) => {
                    addresses.extend(res.addresses);
                    if let Some(err) = res.error {
                        errors.push(err);
                    }
                }
                Err(e) => errors.push(Error::Other(format!("address source task failed: {}", e))),
            }
        }

        tracing::debug!(
            "join resolved {} address(es) from {} source(s) with {} error(s)",
            addresses.len(),
            self.sources.len(),
            errors.len()
        );

        Resolution::partial(addresses, errors)
    }

    fn name(&self) -> &'static str {
        "join"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::time::Duration;

    struct Fixed {
        addresses: Vec<IpAddr>,
        fail: bool,
        delay: Duration,
    }

    #[async_trait]
    impl AddressSource for Fixed {
        async fn resolve(&self, cancel: &CancellationToken) -> Resolution {
            tokio::select! {
                _ = cancel.cancelled() => return Resolution::failed(Error::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
            if self.fail {
                Resolution::failed(Error::lookup("https://ip.example", "HTTP 503"))
            } else {
                Resolution::ok(self.addresses.clone())
            }
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn fixed(addrs: &[&str], fail: bool, delay_ms: u64) -> Arc<dyn AddressSource> {
        Arc::new(Fixed {
            addresses: addrs.iter().map(|a| a.parse().unwrap()).collect(),
            fail,
            delay: Duration::from_millis(delay_ms),
        })
    }

    #[tokio::test]
    async fn keeps_successes_alongside_failures() {
        let join = JoinSource::new(vec![
            fixed(&["198.51.100.4"], false, 0),
            fixed(&[], true, 0),
            fixed(&["2001:db8::4"], false, 0),
        ]);

        let mut res = join.resolve(&CancellationToken::new()).await;
        res.addresses.sort();

        assert_eq!(
            res.addresses,
            vec![
                "198.51.100.4".parse::<IpAddr>().unwrap(),
                "2001:db8::4".parse::<IpAddr>().unwrap()
            ]
        );
        assert!(matches!(res.error, Some(Error::Lookup { .. })));
    }

    #[tokio::test]
    async fn members_run_concurrently() {
        let join = JoinSource::new(vec![
            fixed(&["192.0.2.1"], false, 25),
            fixed(&["192.0.2.2"], false, 25),
            fixed(&["192.0.2.3"], false, 25),
        ]);

        let res = tokio::time::timeout(
            Duration::from_millis(60),
            join.resolve(&CancellationToken::new()),
        )
        .await
        .expect("members should finish before the deadline");

        assert!(res.is_ok());
        assert_eq!(res.addresses.len(), 3);
    }

    #[tokio::test]
    async fn duplicates_propagate() {
        let join = JoinSource::new(vec![
            fixed(&["192.0.2.1"], false, 0),
            fixed(&["192.0.2.1"], false, 0),
        ]);

        let res = join.resolve(&CancellationToken::new()).await;
        assert_eq!(res.addresses.len(), 2);
    }

    #[tokio::test]
    async fn empty_join_is_empty_success() {
        let res = JoinSource::new(Vec::new())
            .resolve(&CancellationToken::new())
            .await;
        assert!(res.is_ok());
        assert!(res.addresses.is_empty());
    }
}
