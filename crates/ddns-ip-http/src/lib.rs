// # Web Address Source
//
// This crate provides the quorum-based public lookup source for the DDNS
// system.
//
// ## Purpose
//
// A host behind NAT cannot see its public address locally, so we ask
// public "what is my IP" endpoints (e.g. https://ipv4.icanhazip.com) and
// only trust an answer that several of them agree on.
//
// ## Quorum
//
// | endpoints | requests issued | matching answers required |
// |-----------|-----------------|---------------------------|
// | 1         | 1               | 1                         |
// | 2         | 2               | 2                         |
// | 3+        | 3               | 2                         |
//
// With fewer than three endpoints some are queried more than once
// (round-robin), so supplying three or more spreads the load.
//
// Agreement is decided in arrival order: the first successful answer is
// remembered, and the first later answer equal to it wins. Failed lookups
// never count toward agreement. The outcome is all-or-nothing.

use ddns_core::ProviderRegistry;
use ddns_core::config::AddressSourceConfig;
use ddns_core::traits::{AddressSource, AddressSourceFactory, Resolution};
use ddns_core::{Error, Result};

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound on a single lookup, applied under the caller's token
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest first line we are willing to buffer
const MAX_LINE_BYTES: usize = 1024;

/// How many lookups to issue and how many must agree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumPlan {
    /// Requests issued per resolution
    pub use_count: usize,
    /// Matching successful answers required
    pub wait_for: usize,
}

impl QuorumPlan {
    /// Plan for `n` configured endpoints
    pub fn for_endpoints(n: usize) -> Self {
        match n {
            0 | 1 => Self {
                use_count: 1,
                wait_for: 1,
            },
            2 => Self {
                use_count: 2,
                wait_for: 2,
            },
            _ => Self {
                use_count: 3,
                wait_for: 2,
            },
        }
    }
}

/// Address source that asks public lookup endpoints and requires agreement
pub struct QuorumResolver {
    /// Parsed endpoint URLs, never empty
    urls: Vec<Url>,

    /// HTTP client
    client: reqwest::Client,
}

impl QuorumResolver {
    /// Create a resolver over `urls`
    ///
    /// # Errors
    ///
    /// - `Error::Config` if `urls` is empty
    /// - `Error::Parse` if a URL is malformed or not http(s)
    pub fn new<I, S>(urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let urls = urls
            .into_iter()
            .map(|u| parse_endpoint(u.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if urls.is_empty() {
            return Err(Error::config("Web address source needs at least one URL"));
        }

        Ok(Self {
            urls,
            client: reqwest::Client::new(),
        })
    }

    /// Use a shared HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Configured endpoints
    pub fn endpoints(&self) -> &[Url] {
        &self.urls
    }

    /// Quorum plan for the configured endpoints
    pub fn plan(&self) -> QuorumPlan {
        QuorumPlan::for_endpoints(self.urls.len())
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::parse(format!("invalid lookup URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::parse(format!(
            "lookup URL '{}' has unsupported scheme '{}'",
            raw, other
        ))),
    }
}

#[async_trait::async_trait]
impl AddressSource for QuorumResolver {
    async fn resolve(&self, cancel: &CancellationToken) -> Resolution {
        let plan = self.plan();

        // Outstanding lookups are aborted as soon as we return
        let lookups = cancel.child_token();
        let _abort_outstanding = lookups.clone().drop_guard();

        let (tx, mut rx) = mpsc::channel(plan.use_count);
        for i in 0..plan.use_count {
            let url = self.urls[i % self.urls.len()].clone();
            let client = self.client.clone();
            let token = lookups.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::Cancelled),
                    res = lookup(&client, &url) => res,
                };
                match &result {
                    Ok(addr) => debug!("{} answered {}", url, addr),
                    Err(e) => debug!("{}", e),
                }
                // The receiver is gone once a verdict is reached
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let mut first: Option<IpAddr> = None;
        let mut received = 0;
        let mut failures = Vec::new();

        while let Some(result) = rx.recv().await {
            match result {
                Ok(addr) => {
                    received += 1;
                    match first {
                        None if plan.wait_for == 1 => return Resolution::ok(vec![addr]),
                        None => first = Some(addr),
                        Some(agreed) if agreed == addr => return Resolution::ok(vec![addr]),
                        Some(_) => {}
                    }
                }
                Err(e) => failures.push(e),
            }
        }

        let err = if received < plan.wait_for {
            Error::InsufficientResponses {
                required: plan.wait_for,
                received,
                failures: failures.into(),
            }
        } else {
            Error::Disagreement {
                failures: failures.into(),
            }
        };
        warn!("Public address lookup failed: {}", err);
        Resolution::failed(err)
    }

    fn name(&self) -> &'static str {
        "web"
    }
}

/// Fetch one address from one endpoint
async fn lookup(client: &reqwest::Client, url: &Url) -> Result<IpAddr> {
    let fail = |message: String| Error::lookup(url.as_str(), message);

    let mut response = client
        .get(url.clone())
        .header(reqwest::header::CACHE_CONTROL, "no-cache")
        .timeout(LOOKUP_TIMEOUT)
        .send()
        .await
        .map_err(|e| fail(format!("request failed: {}", e)))?;

    if response.status() != StatusCode::OK {
        return Err(fail(format!("unexpected status {}", response.status())));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| fail(format!("failed to read response: {}", e)))?
    {
        body.extend_from_slice(&chunk);
        if body.contains(&b'\n') || body.len() >= MAX_LINE_BYTES {
            break;
        }
    }

    let line = first_line(&body);
    let addr: IpAddr = line
        .parse()
        .map_err(|_| fail(format!("response is not an IP address: {:?}", line)))?;

    if addr.is_loopback() {
        return Err(fail(format!("endpoint answered with loopback address {}", addr)));
    }

    Ok(addr)
}

/// First line of `body`, trimmed and capped at [`MAX_LINE_BYTES`]
fn first_line(body: &[u8]) -> String {
    let end = body
        .iter()
        .position(|b| *b == b'\n')
        .unwrap_or(body.len())
        .min(MAX_LINE_BYTES);
    String::from_utf8_lossy(&body[..end]).trim().to_string()
}

/// Factory for creating quorum web sources
pub struct WebFactory {
    client: reqwest::Client,
}

impl WebFactory {
    /// Factory whose sources share `client`
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for WebFactory {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new())
    }
}

impl AddressSourceFactory for WebFactory {
    fn create(&self, config: &AddressSourceConfig) -> Result<Arc<dyn AddressSource>> {
        match config {
            AddressSourceConfig::Web { urls } => Ok(Arc::new(
                QuorumResolver::new(urls)?.with_client(self.client.clone()),
            )),
            _ => Err(Error::config("Invalid config for web address source")),
        }
    }
}

/// Register the web address source with a registry
pub fn register(registry: &ProviderRegistry, client: reqwest::Client) {
    registry.register_source("web", Box::new(WebFactory::with_client(client)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::get;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    async fn answering(body: &'static str) -> String {
        serve(Router::new().route("/", get(move || async move { body }))).await
    }

    async fn answering_after(body: &'static str, delay: Duration) -> String {
        serve(Router::new().route(
            "/",
            get(move || async move {
                tokio::time::sleep(delay).await;
                body
            }),
        ))
        .await
    }

    async fn counting(body: &'static str, hits: Arc<AtomicUsize>) -> String {
        serve(Router::new().route(
            "/",
            get(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    body
                }
            }),
        ))
        .await
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn resolver(urls: &[String]) -> QuorumResolver {
        QuorumResolver::new(urls).unwrap().with_client(client())
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn plan_follows_endpoint_count() {
        assert_eq!(
            QuorumPlan::for_endpoints(1),
            QuorumPlan {
                use_count: 1,
                wait_for: 1
            }
        );
        assert_eq!(
            QuorumPlan::for_endpoints(2),
            QuorumPlan {
                use_count: 2,
                wait_for: 2
            }
        );
        for n in [3, 4, 10] {
            assert_eq!(
                QuorumPlan::for_endpoints(n),
                QuorumPlan {
                    use_count: 3,
                    wait_for: 2
                }
            );
        }
    }

    #[test]
    fn construction_validates_urls() {
        let empty: [&str; 0] = [];
        assert!(matches!(QuorumResolver::new(empty), Err(Error::Config(_))));
        assert!(matches!(QuorumResolver::new(["not a url"]), Err(Error::Parse(_))));
        assert!(matches!(
            QuorumResolver::new(["ftp://example.com/ip"]),
            Err(Error::Parse(_))
        ));
        assert!(QuorumResolver::new(["https://ipv4.icanhazip.com"]).is_ok());
    }

    #[test]
    fn first_line_is_trimmed_and_capped() {
        assert_eq!(first_line(b"  192.0.2.1 \r\nsecond line\n"), "192.0.2.1");
        assert_eq!(first_line(b"2001:db8::1"), "2001:db8::1");
        assert_eq!(first_line(&[b'1'; 4096]).len(), MAX_LINE_BYTES);
    }

    #[tokio::test]
    async fn single_endpoint_is_trusted() {
        let url = answering("192.0.2.1\n").await;
        let res = resolver(&[url]).resolve(&CancellationToken::new()).await;

        assert!(res.is_ok(), "{:?}", res.error);
        assert_eq!(res.addresses, vec![ip("192.0.2.1")]);
    }

    #[tokio::test]
    async fn three_agreeing_endpoints() {
        let urls = vec![
            answering("192.0.2.1").await,
            answering("192.0.2.1").await,
            answering("192.0.2.1").await,
        ];
        let res = resolver(&urls).resolve(&CancellationToken::new()).await;

        assert_eq!(res.into_result().unwrap(), vec![ip("192.0.2.1")]);
    }

    #[tokio::test]
    async fn mismatched_answers_are_rejected() {
        let urls = vec![
            answering("192.168.2.1").await,
            answering("10.0.0.10").await,
            answering("127.0.0.1").await,
        ];
        let res = resolver(&urls).resolve(&CancellationToken::new()).await;

        assert!(res.addresses.is_empty());
        assert!(matches!(res.error, Some(Error::Disagreement { .. })), "{:?}", res.error);
    }

    #[tokio::test]
    async fn one_failure_still_reaches_quorum() {
        let urls = vec![
            answering("192.0.2.1").await,
            answering("a").await,
            answering("192.0.2.1").await,
        ];
        let res = resolver(&urls).resolve(&CancellationToken::new()).await;

        assert_eq!(res.into_result().unwrap(), vec![ip("192.0.2.1")]);
    }

    #[tokio::test]
    async fn two_failures_are_insufficient() {
        let failing = serve(Router::new().route(
            "/",
            get(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "192.0.2.1") }),
        ))
        .await;
        let urls = vec![answering("192.0.2.1").await, failing, answering("a").await];
        let res = resolver(&urls).resolve(&CancellationToken::new()).await;

        assert!(res.addresses.is_empty());
        match res.error {
            Some(Error::InsufficientResponses {
                required,
                received,
                failures,
            }) => {
                assert_eq!(required, 2);
                assert_eq!(received, 1);
                assert_eq!(failures.len(), 2);
            }
            other => panic!("expected insufficient responses, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn two_endpoints_must_both_agree() {
        let urls = vec![answering("192.0.2.1").await, answering("192.0.2.2").await];
        let res = resolver(&urls).resolve(&CancellationToken::new()).await;

        assert!(res.addresses.is_empty());
        assert!(matches!(res.error, Some(Error::Disagreement { .. })), "{:?}", res.error);
    }

    #[tokio::test]
    async fn two_endpoints_with_one_failure_are_insufficient() {
        let failing = serve(Router::new().route(
            "/",
            get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "192.0.2.1") }),
        ))
        .await;
        let urls = vec![answering("192.0.2.1").await, failing];
        let res = resolver(&urls).resolve(&CancellationToken::new()).await;

        assert!(res.addresses.is_empty());
        assert!(
            matches!(
                res.error,
                Some(Error::InsufficientResponses {
                    required: 2,
                    received: 1,
                    ..
                })
            ),
            "{:?}",
            res.error
        );
    }

    #[tokio::test]
    async fn agreement_is_decided_in_arrival_order() {
        let urls = vec![
            answering("192.0.2.1").await,
            answering_after("192.0.2.9", Duration::from_secs(5)).await,
            answering_after("192.0.2.1", Duration::from_millis(50)).await,
        ];

        let source = resolver(&urls);
        let started = Instant::now();
        let res = source.resolve(&CancellationToken::new()).await;

        assert_eq!(res.into_result().unwrap(), vec![ip("192.0.2.1")]);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn lookups_run_concurrently() {
        let delay = Duration::from_millis(100);
        let urls = vec![
            answering_after("192.0.2.1", delay).await,
            answering_after("192.0.2.1", delay).await,
            answering_after("192.0.2.1", delay).await,
        ];

        // Client construction loads root certificates; keep it off the clock
        let source = resolver(&urls);
        let started = Instant::now();
        let res = source.resolve(&CancellationToken::new()).await;

        assert!(res.is_ok());
        // Two sequential lookups would take at least 200ms
        assert!(started.elapsed() < Duration::from_millis(190), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn non_200_status_is_a_failure() {
        let url = serve(Router::new().route("/", get(|| async { AxumStatus::NOT_FOUND }))).await;
        let res = resolver(&[url]).resolve(&CancellationToken::new()).await;

        assert!(matches!(
            res.error,
            Some(Error::InsufficientResponses { received: 0, .. })
        ));
    }

    #[tokio::test]
    async fn loopback_answer_is_a_failure() {
        let url = answering("127.0.0.1").await;
        let res = resolver(&[url]).resolve(&CancellationToken::new()).await;

        assert!(res.addresses.is_empty());
        assert!(res.error.is_some());
    }

    #[tokio::test]
    async fn cache_busting_header_is_sent() {
        let url = serve(Router::new().route(
            "/",
            get(|headers: HeaderMap| async move {
                match headers.get("cache-control").and_then(|v| v.to_str().ok()) {
                    Some("no-cache") => (AxumStatus::OK, "192.0.2.1"),
                    _ => (AxumStatus::BAD_REQUEST, "missing cache-control"),
                }
            }),
        ))
        .await;
        let res = resolver(&[url]).resolve(&CancellationToken::new()).await;

        assert!(res.is_ok(), "{:?}", res.error);
    }

    #[tokio::test]
    async fn endpoints_are_reused_round_robin() {
        let single_hits = Arc::new(AtomicUsize::new(0));
        let url = counting("192.0.2.1", single_hits.clone()).await;
        resolver(&[url]).resolve(&CancellationToken::new()).await;
        assert_eq!(single_hits.load(Ordering::SeqCst), 1);

        let a_hits = Arc::new(AtomicUsize::new(0));
        let b_hits = Arc::new(AtomicUsize::new(0));
        let urls = vec![
            counting("192.0.2.1", a_hits.clone()).await,
            counting("192.0.2.1", b_hits.clone()).await,
        ];
        let res = resolver(&urls).resolve(&CancellationToken::new()).await;
        assert!(res.is_ok());
        assert_eq!(a_hits.load(Ordering::SeqCst), 1);
        assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_outstanding_lookups() {
        let url = answering_after("192.0.2.1", Duration::from_secs(30)).await;
        let source = resolver(&[url]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let res = tokio::time::timeout(Duration::from_secs(2), source.resolve(&cancel))
            .await
            .expect("resolve honors cancellation");
        assert!(res.addresses.is_empty());
        assert!(res.error.is_some());
    }

    #[test]
    fn factory_builds_web_sources_only() {
        let factory = WebFactory::with_client(client());

        let web = AddressSourceConfig::Web {
            urls: vec!["https://ipv4.icanhazip.com".to_string()],
        };
        assert_eq!(factory.create(&web).unwrap().name(), "web");

        let other = AddressSourceConfig::Interface {
            interfaces: Vec::new(),
        };
        assert!(factory.create(&other).is_err());
    }

    #[test]
    fn register_adds_web_type() {
        let registry = ProviderRegistry::new();
        register(&registry, client());
        assert!(registry.has_source("web"));
    }
}
