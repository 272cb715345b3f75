//! Minimal embedding example for ddns-core
//!
//! This example demonstrates using ddns-core as a library in a custom application.
//! The engine lifecycle is fully managed by the application: it runs one
//! cycle, repeats it to show idempotence, then runs the daemon loop briefly
//! and stops it through a cancellation token.

use ddns_core::config::{AddressSourceConfig, DaemonConfig, DdnsConfig};
use ddns_core::traits::{DnsProvider, ExistingRecord, NewRecord};
use ddns_core::{DaemonExit, DdnsEngine, ProviderRegistry, Result};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// In-memory DNS provider holding one zone
#[derive(Clone, Default)]
struct EmbeddedProvider {
    records: Arc<Mutex<Vec<ExistingRecord>>>,
    next_id: Arc<Mutex<usize>>,
}

impl EmbeddedProvider {
    fn seeded(domain: &str, address: IpAddr) -> Self {
        let provider = Self::default();
        provider.insert(domain, address);
        provider
    }

    fn insert(&self, domain: &str, address: IpAddr) -> ExistingRecord {
        let mut next_id = self.next_id.lock().unwrap_or_else(|e| e.into_inner());
        *next_id += 1;
        let record = ExistingRecord {
            id: format!("embedded-{}", next_id),
            kind: ddns_core::RecordKind::of(&address),
            name: domain.to_string(),
            address,
        };
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        record
    }

    fn snapshot(&self) -> Vec<IpAddr> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|r| r.address)
            .collect()
    }
}

#[async_trait::async_trait]
impl DnsProvider for EmbeddedProvider {
    async fn resolve_zone(&self, _domain: &str) -> Result<String> {
        Ok("embedded-zone".to_string())
    }

    async fn list_records(&self, _zone: &str, domain: &str) -> Result<Vec<ExistingRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.name == domain)
            .cloned()
            .collect())
    }

    async fn delete_record(&self, _zone: &str, record: &ExistingRecord) -> Result<()> {
        println!("[Embedded] Deleting {} {}", record.kind, record.address);
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|r| r.id != record.id);
        Ok(())
    }

    async fn create_record(&self, _zone: &str, record: &NewRecord) -> Result<ExistingRecord> {
        println!(
            "[Embedded] Creating {} {} (ttl {}, {:?})",
            record.kind, record.address, record.ttl, record.comment
        );
        Ok(self.insert(&record.name, record.address))
    }

    fn provider_name(&self) -> &'static str {
        "embedded"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    println!("=== Embedded ddns-core Example ===\n");

    let domain = "home.example.com";
    let provider = EmbeddedProvider::seeded(domain, IpAddr::from([198, 51, 100, 7]));

    // Desired set: one IPv4 and one IPv6 address, joined
    let config = DdnsConfig::new(domain)
        .with_source(AddressSourceConfig::Join {
            sources: vec![
                AddressSourceConfig::Static {
                    address: "192.0.2.10".to_string(),
                },
                AddressSourceConfig::Static {
                    address: "2001:db8::10".to_string(),
                },
            ],
        })
        .with_daemon(DaemonConfig {
            interval_secs: 60,
            run_once: false,
            event_channel_capacity: 16,
        });

    // Static and join sources need no plugin registration
    let registry = ProviderRegistry::new();
    let source = registry.create_source(&config.source)?;

    println!("1. Creating engine...");
    let (engine, mut event_rx) = DdnsEngine::new(source, Box::new(provider.clone()), config)?;

    let event_listener = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    let cancel = CancellationToken::new();

    println!("2. Running one cycle...");
    let report = engine.run_once(&cancel).await?;
    println!(
        "   created {:?}, deleted {:?}, provider now holds {:?}\n",
        report.created,
        report.deleted,
        provider.snapshot()
    );

    println!("3. Running again (should change nothing)...");
    let report = engine.run_once(&cancel).await?;
    println!("   no-op: {}\n", report.is_noop());

    println!("4. Starting daemon loop, stopping it after 200ms...");
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stopper.cancel();
    });

    match engine.run_daemon(&cancel).await {
        DaemonExit::Cancelled => println!("   daemon stopped by cancellation"),
        DaemonExit::Fatal(e) => println!("   daemon stopped: {}", e),
    }

    drop(engine);
    let _ = tokio::time::timeout(Duration::from_millis(100), event_listener).await;

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Engine lifecycle is fully controlled by application");
    println!("- Cancellation is a token owned by the application");
    println!("- No global state");
    println!("- All components are custom (not ddnsd defaults)");

    Ok(())
}
