// # ddnsd - DDNS Daemon
//
// ⚠️ ARCHITECTURAL CONSTRAINTS ⚠️
//
// - This is a THIN integration layer ONLY
// - DO NOT add business logic, DNS logic, or retry logic here
// - All DDNS logic MUST be in ddns-core
// - Configuration is via environment variables ONLY
//
// The ddnsd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and address sources
// 4. Running one cycle, or the daemon loop until a signal arrives
//
// ## Configuration
//
// ### Domain
// - `DDNS_DOMAIN`: Domain whose A/AAAA records are managed
//
// ### Address Source
// - `DDNS_SOURCE_TYPE`: interface (default), web, static, dual-web
// - `DDNS_SOURCE_URLS`: Comma-separated lookup URLs (web, dual-web)
// - `DDNS_SOURCE_URLS_V6`: Comma-separated IPv6 lookup URLs (dual-web)
// - `DDNS_SOURCE_INTERFACES`: Comma-separated interface names (interface)
// - `DDNS_SOURCE_ADDRESS`: Fixed address (static)
//
// ### DNS Provider
// - `DDNS_PROVIDER_TYPE`: Provider type (cloudflare)
// - `DDNS_PROVIDER_API_TOKEN`: API token
// - `DDNS_PROVIDER_TOKEN_FILE`: Token file, used when no token is set (default `$HOME/.cloudflare`)
// - `DDNS_PROVIDER_ZONE_ID`: Zone ID (optional)
//
// ### Daemon
// - `DDNS_INTERVAL_SECS`: Seconds between cycles (default 300, minimum 60)
// - `DDNS_RUN_ONCE`: Run a single cycle and exit
// - `DDNS_LOG_LEVEL`: trace, debug, verbose, info, warn, error
// - `DDNS_MODE`: Set to `dry-run` to log mutations instead of performing them
//
// ## Example
//
// ```bash
// export DDNS_DOMAIN=home.example.com
// export DDNS_SOURCE_TYPE=web
// export DDNS_SOURCE_URLS=https://ipv4.icanhazip.com,https://api.ipify.org,https://ifconfig.me/ip
// export DDNS_PROVIDER_API_TOKEN=your_token
//
// ddnsd
// ```

mod config;

use anyhow::Result;
use config::Config;
use ddns_core::{DaemonExit, DdnsEngine, ProviderRegistry};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error, including a fatal daemon stop
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DdnsExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd for {}", config.domain);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(config)).into()
}

/// Build the engine and drive it until done
async fn run(config: Config) -> DdnsExitCode {
    let engine = match build_engine(&config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    let root = CancellationToken::new();
    if let Err(e) = spawn_signal_handler(root.clone()) {
        error!("Failed to install signal handlers: {:#}", e);
        return DdnsExitCode::RuntimeError;
    }

    if config.run_once {
        return match engine.run_once(&root).await {
            Ok(report) => {
                info!(
                    "{} reconciled: {} created, {} deleted, {} unchanged",
                    engine.domain(),
                    report.created.len(),
                    report.deleted.len(),
                    report.unchanged.len()
                );
                DdnsExitCode::CleanShutdown
            }
            Err(_) if root.is_cancelled() => {
                info!("Run cancelled");
                DdnsExitCode::CleanShutdown
            }
            Err(e) => {
                error!("{}", e);
                DdnsExitCode::RuntimeError
            }
        };
    }

    if config.source_type == "static" {
        warn!("Static address source never changes; consider DDNS_RUN_ONCE=true");
    }

    match engine.run_daemon(&root).await {
        DaemonExit::Cancelled => {
            info!("Shutting down daemon");
            DdnsExitCode::CleanShutdown
        }
        DaemonExit::Fatal(e) => {
            error!("Daemon stopped: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Register plugins and create the engine from configuration
fn build_engine(config: &Config) -> Result<DdnsEngine> {
    let api_token = config.api_token()?;

    // One client for every lookup and provider call
    let client = reqwest::Client::builder()
        .user_agent(concat!("ddnsd/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    {
        debug!("Registering Cloudflare provider");
        ddns_provider_cloudflare::register(&registry, client.clone());
    }

    #[cfg(feature = "http")]
    {
        debug!("Registering web address source");
        ddns_ip_http::register(&registry, client.clone());
    }

    #[cfg(feature = "interface")]
    {
        debug!("Registering interface address source");
        ddns_ip_interface::register(&registry);
    }

    let ddns_config = config.to_ddns_config(api_token);
    let source = registry.create_source(&ddns_config.source)?;
    let provider = registry.create_provider(&ddns_config.provider)?;

    info!(
        "Address source: {}, provider: {}, interval: {}s",
        source.name(),
        provider.provider_name(),
        ddns_config.daemon.interval().as_secs()
    );

    let (engine, mut events) = DdnsEngine::new(source, provider, ddns_config)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    Ok(engine)
}

/// Cancel `root` on the first SIGINT/SIGTERM; force exit on the second
fn spawn_signal_handler(root: CancellationToken) -> Result<()> {
    let mut signals = Signals::new()?;

    tokio::spawn(async move {
        let name = signals.recv().await;
        info!("Received {}; shutting down", name);
        root.cancel();

        let name = signals.recv().await;
        error!("Received second {}; forcing exit", name);
        std::process::exit(DdnsExitCode::RuntimeError as i32);
    });

    Ok(())
}

/// Shutdown signal listener
#[cfg(unix)]
struct Signals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?,
            sigint: signal(SignalKind::interrupt())
                .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Shutdown signal listener (CTRL-C only)
#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn new() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}
