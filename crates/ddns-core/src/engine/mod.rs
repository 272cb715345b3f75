//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Resolving the desired address set via an AddressSource
//! - Reconciling the provider's records onto that set
//! - Repeating the cycle on a timer and deciding when to give up
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ AddressSource │─── desired set ───┐
//! └───────────────┘                   │
//!                                     ▼
//!                            ┌──────────────┐
//!                            │ DdnsEngine   │
//!                            └──────────────┘
//!                                     │
//!                     ┌───────────────┴───────────────┐
//!                     ▼                               ▼
//!             ┌──────────────┐                ┌─────────────┐
//!             │  Reconciler  │                │   Events    │
//!             │ (DnsProvider)│                │  (notify)   │
//!             └──────────────┘                └─────────────┘
//! ```
//!
//! ## Daemon states
//!
//! ```text
//!          timer / first run            cycle done (non-fatal)
//!   Idle ─────────────────────▶ Running ──────────────────────▶ Idle
//!    │                             │
//!    │ cancelled                   │ authentication / authorization failure
//!    ▼                             ▼
//! Stopped ◀────────────────────────┘
//! ```

use crate::config::{DdnsConfig, validate_domain_name};
use crate::error::{Error, Result};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::traits::{AddressSource, DnsProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A resolve-then-reconcile cycle started
    CycleStarted {
        domain: String,
    },

    /// A cycle completed
    CycleSucceeded {
        domain: String,
        report: ReconcileReport,
    },

    /// A cycle failed
    CycleFailed {
        domain: String,
        error: String,
        fatal: bool,
    },

    /// The daemon loop stopped
    Stopped {
        reason: String,
    },
}

/// Daemon loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Waiting for the next tick
    Idle,
    /// A cycle is in flight
    Running,
    /// Terminal
    Stopped,
}

/// Why the daemon loop returned
#[derive(Debug)]
pub enum DaemonExit {
    /// The governing token was cancelled
    Cancelled,
    /// A cycle failed with an authentication or authorization error
    Fatal(Error),
}

/// Core DDNS engine
///
/// The engine runs one "resolve, then reconcile" cycle on demand
/// ([`DdnsEngine::run_once`]) or repeatedly on a timer
/// ([`DdnsEngine::run_daemon`]).
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Run once, or start the daemon with a cancellation token
/// 3. Cancel the token to stop
///
/// ## Threading
///
/// The engine is `Send + Sync`; the daemon drives cycles sequentially, but
/// the address source may be shared with other engines.
pub struct DdnsEngine {
    /// Address source for the desired set
    source: Arc<dyn AddressSource>,

    /// Reconciler over the DNS provider
    reconciler: Reconciler,

    /// Domain to manage
    domain: String,

    /// Delay between cycles (floor already applied)
    interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `source`: Address source implementation
    /// - `provider`: DNS provider implementation
    /// - `config`: DDNS configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Arc<dyn AddressSource>,
        provider: Box<dyn DnsProvider>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        // Source and provider are injected already built
        validate_domain_name(&config.domain)?;
        config.daemon.validate()?;

        let (tx, rx) = mpsc::channel(config.daemon.event_channel_capacity);

        let engine = Self {
            source,
            reconciler: Reconciler::new(provider),
            domain: config.domain,
            interval: config.daemon.interval(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Managed domain
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Effective daemon interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run a single resolve-then-reconcile cycle
    ///
    /// Any resolution error aborts the cycle before the provider is
    /// contacted. An empty resolution is treated as an error as well,
    /// since reconciling onto nothing would delete every record.
    ///
    /// # Returns
    ///
    /// - `Ok(ReconcileReport)`: What changed at the provider
    /// - `Err(Error::Resolve)`: The address source failed
    /// - `Err(Error::Update)`: Reconciliation failed
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<ReconcileReport> {
        let resolution = self.source.resolve(cancel).await;
        let addresses = resolution
            .into_result()
            .map_err(|e| Error::Resolve(Box::new(e)))?;

        if addresses.is_empty() {
            return Err(Error::Resolve(Box::new(Error::Other(format!(
                "{} source returned no addresses",
                self.source.name()
            )))));
        }
        debug!("Resolved addresses: {:?}", addresses);

        self.reconciler
            .reconcile(cancel, &self.domain, &addresses)
            .await
            .map_err(|e| Error::Update {
                domain: self.domain.clone(),
                source: Box::new(e),
            })
    }

    /// Run cycles until cancelled or fatally rejected
    ///
    /// The first cycle runs immediately; later cycles run every
    /// [`DdnsEngine::interval`]. Non-fatal errors are logged and the loop
    /// continues. Authentication and authorization failures stop the loop,
    /// since every later tick would fail the same way.
    pub async fn run_daemon(&self, cancel: &CancellationToken) -> DaemonExit {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Starting daemon for {} (interval {:?}, provider {})",
            self.domain,
            self.interval,
            self.reconciler.provider_name()
        );

        let mut state = DaemonState::Idle;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.transition(&mut state, DaemonState::Stopped);
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Cancelled".to_string(),
                    });
                    return DaemonExit::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            self.transition(&mut state, DaemonState::Running);
            let outcome = self.run_cycle(cancel).await;
            if cancel.is_cancelled() {
                self.transition(&mut state, DaemonState::Stopped);
                self.emit_event(EngineEvent::Stopped {
                    reason: "Cancelled".to_string(),
                });
                return DaemonExit::Cancelled;
            }
            if let Err(e) = outcome {
                if e.is_fatal() {
                    if e.is_authentication() {
                        error!("Bad credentials detected; stopping daemon: {}", e);
                    } else {
                        error!("Credentials are not authorized for this action; stopping daemon: {}", e);
                    }
                    self.transition(&mut state, DaemonState::Stopped);
                    self.emit_event(EngineEvent::Stopped {
                        reason: e.to_string(),
                    });
                    return DaemonExit::Fatal(e);
                }
                warn!("Cycle failed: {}", e);
            }
            self.transition(&mut state, DaemonState::Idle);
        }
    }

    /// One cycle with event reporting
    async fn run_cycle(&self, cancel: &CancellationToken) -> Result<ReconcileReport> {
        self.emit_event(EngineEvent::CycleStarted {
            domain: self.domain.clone(),
        });

        match self.run_once(cancel).await {
            Ok(report) => {
                if report.is_noop() {
                    debug!("{} unchanged", self.domain);
                } else {
                    info!(
                        "{} updated: {} created, {} deleted",
                        self.domain,
                        report.created.len(),
                        report.deleted.len()
                    );
                }
                self.emit_event(EngineEvent::CycleSucceeded {
                    domain: self.domain.clone(),
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(e) if cancel.is_cancelled() => {
                debug!("{} cycle abandoned: {}", self.domain, e);
                Err(e)
            }
            Err(e) => {
                self.emit_event(EngineEvent::CycleFailed {
                    domain: self.domain.clone(),
                    error: e.to_string(),
                    fatal: e.is_fatal(),
                });
                Err(e)
            }
        }
    }

    fn transition(&self, state: &mut DaemonState, next: DaemonState) {
        debug!("Daemon state {:?} -> {:?}", state, next);
        *state = next;
    }

    /// Emit an engine event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: EngineEvent) {
        // Events are advisory; a slow consumer loses events rather than stalling cycles
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
