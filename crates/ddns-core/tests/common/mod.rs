//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that verify architectural
//! constraints without talking to real services.

#![allow(dead_code)]

use ddns_core::config::{AddressSourceConfig, DaemonConfig, DdnsConfig, ProviderConfig};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{
    AddressSource, DnsProvider, ExistingRecord, NewRecord, RecordKind, Resolution,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Parse an address literal
pub fn ip(text: &str) -> IpAddr {
    text.parse().expect("valid IP literal")
}

/// An address source returning a fixed answer and counting calls
pub struct ScriptedSource {
    addresses: Vec<IpAddr>,
    fail: bool,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    /// Always resolve to `addresses`
    pub fn returning(addresses: &[&str]) -> Self {
        Self {
            addresses: addresses.iter().map(|a| ip(a)).collect(),
            fail: false,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always fail with a quorum disagreement
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::returning(&[])
        }
    }

    /// Take `delay` to answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared handle on the call counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait::async_trait]
impl AddressSource for ScriptedSource {
    async fn resolve(&self, cancel: &CancellationToken) -> Resolution {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Resolution::failed(Error::Cancelled),
                _ = tokio::time::sleep(self.delay) => {}
            }
        }
        if self.fail {
            Resolution::failed(Error::Disagreement {
                failures: Default::default(),
            })
        } else {
            Resolution::ok(self.addresses.clone())
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// A provider call, as observed by [`MockDnsProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ResolveZone(String),
    List(String),
    Delete(IpAddr),
    Create(RecordKind, IpAddr),
}

/// Which call a [`MockDnsProvider`] should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Nothing,
    Zone,
    Delete,
    Create,
}

/// Which error a [`MockDnsProvider`] should fail with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailWith {
    Authentication,
    Authorization,
    Transient,
}

impl FailWith {
    fn error(self) -> Error {
        match self {
            FailWith::Authentication => Error::auth("invalid token"),
            FailWith::Authorization => Error::forbidden("token cannot edit DNS"),
            FailWith::Transient => Error::provider("mock", "HTTP 502"),
        }
    }
}

struct Inner {
    records: Vec<ExistingRecord>,
    calls: Vec<Call>,
    next_id: usize,
    fail_on: FailOn,
    fail_with: FailWith,
}

/// An in-memory provider that applies mutations and logs every call
#[derive(Clone)]
pub struct MockDnsProvider {
    inner: Arc<Mutex<Inner>>,
    list_delay: Duration,
}

impl MockDnsProvider {
    /// A provider already holding records for `existing` under `domain`
    pub fn with_records(domain: &str, existing: &[&str]) -> Self {
        let records = existing
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let address = ip(a);
                ExistingRecord {
                    id: format!("rec-{}", i),
                    kind: RecordKind::of(&address),
                    name: domain.to_string(),
                    address,
                }
            })
            .collect::<Vec<_>>();

        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: records.len(),
                records,
                calls: Vec::new(),
                fail_on: FailOn::Nothing,
                fail_with: FailWith::Transient,
            })),
            list_delay: Duration::ZERO,
        }
    }

    /// An empty provider
    pub fn empty() -> Self {
        Self::with_records("unused.example.com", &[])
    }

    /// Fail the given call with the given error
    pub fn failing(self, on: FailOn, with: FailWith) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = on;
            inner.fail_with = with;
        }
        self
    }

    /// Make record listing slow
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    /// Every call seen so far
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Number of create and delete calls
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(..) | Call::Delete(_)))
            .count()
    }

    /// Addresses currently held
    pub fn addresses(&self) -> Vec<IpAddr> {
        let mut addrs: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .records
            .iter()
            .map(|r| r.address)
            .collect();
        addrs.sort();
        addrs
    }

    fn check(&self, op: FailOn) -> Result<()> {
        let inner = self.inner.lock().unwrap();
        if inner.fail_on == op {
            Err(inner.fail_with.error())
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn resolve_zone(&self, domain: &str) -> Result<String> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(Call::ResolveZone(domain.to_string()));
        self.check(FailOn::Zone)?;
        Ok("zone-1".to_string())
    }

    async fn list_records(&self, _zone: &str, domain: &str) -> Result<Vec<ExistingRecord>> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(Call::List(domain.to_string()));
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        Ok(self.inner.lock().unwrap().records.clone())
    }

    async fn delete_record(&self, _zone: &str, record: &ExistingRecord) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(Call::Delete(record.address));
        self.check(FailOn::Delete)?;
        self.inner.lock().unwrap().records.retain(|r| r.id != record.id);
        Ok(())
    }

    async fn create_record(&self, _zone: &str, record: &NewRecord) -> Result<ExistingRecord> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(Call::Create(record.kind, record.address));
        self.check(FailOn::Create)?;

        let mut inner = self.inner.lock().unwrap();
        let created = ExistingRecord {
            id: format!("rec-{}", inner.next_id),
            kind: record.kind,
            name: record.name.clone(),
            address: record.address,
        };
        inner.next_id += 1;
        inner.records.push(created.clone());
        Ok(created)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Helper to create a minimal DdnsConfig for testing
pub fn minimal_config(domain: &str) -> DdnsConfig {
    DdnsConfig {
        domain: domain.to_string(),
        source: AddressSourceConfig::Static {
            address: "192.0.2.1".to_string(),
        },
        provider: ProviderConfig::Cloudflare {
            api_token: "test-token".to_string(),
            zone_id: None,
            dry_run: false,
        },
        daemon: DaemonConfig {
            interval_secs: 60,
            run_once: false,
            event_channel_capacity: 100,
        },
    }
}
