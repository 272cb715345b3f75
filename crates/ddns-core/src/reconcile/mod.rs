//! Record reconciliation
//!
//! The [`Reconciler`] converges a provider's A/AAAA records for one domain
//! onto a desired address set.
//!
//! ## Algorithm
//!
//! ```text
//! desired ──┐
//!           ├── existing − desired ──▶ delete (all of them, first)
//! existing ─┤
//!           └── desired − existing ──▶ create (after every delete)
//! ```
//!
//! Records present in both sets are never touched, so a second pass with
//! the same desired set performs zero mutations. Deletes complete before
//! any create starts, and the first failed mutation aborts the pass.
//!
//! Nothing is cached: the existing set is fetched fresh every pass, so
//! out-of-band edits at the provider are corrected on the next pass.

use std::collections::BTreeSet;
use std::future::Future;
use std::net::IpAddr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::traits::{DnsProvider, NewRecord};

/// What a reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Provider-side zone the domain lives in
    pub zone: String,
    /// Addresses for which records were created
    pub created: Vec<IpAddr>,
    /// Addresses whose records were deleted
    pub deleted: Vec<IpAddr>,
    /// Addresses already present and left alone
    pub unchanged: Vec<IpAddr>,
}

impl ReconcileReport {
    /// Whether the pass performed no mutations
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// Diff-and-converge engine over a [`DnsProvider`]
pub struct Reconciler {
    provider: Box<dyn DnsProvider>,
}

impl Reconciler {
    /// Create a reconciler for `provider`
    pub fn new(provider: Box<dyn DnsProvider>) -> Self {
        Self { provider }
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Converge `domain`'s records onto `desired`
    ///
    /// `desired` is treated as a set: order and duplicates are irrelevant.
    ///
    /// # Errors
    ///
    /// Any provider failure aborts the pass immediately; so does `cancel`
    /// firing, which drops the in-flight provider request.
    pub async fn reconcile(
        &self,
        cancel: &CancellationToken,
        domain: &str,
        desired: &[IpAddr],
    ) -> Result<ReconcileReport> {
        let desired: BTreeSet<IpAddr> = desired.iter().copied().collect();

        let zone = cancellable(cancel, self.provider.resolve_zone(domain)).await?;
        debug!("Domain {} lives in zone {}", domain, zone);

        let records = cancellable(cancel, self.provider.list_records(&zone, domain)).await?;
        debug!("Found {} existing A/AAAA record(s) for {}", records.len(), domain);

        let mut report = ReconcileReport {
            zone: zone.clone(),
            ..ReconcileReport::default()
        };

        let existing: BTreeSet<IpAddr> = records.iter().map(|r| r.address).collect();

        for record in &records {
            if desired.contains(&record.address) {
                debug!("Record {} {} is still desired", record.kind, record.address);
                continue;
            }

            info!("Deleting {} record {} for {}", record.kind, record.address, domain);
            cancellable(cancel, self.provider.delete_record(&zone, record))
                .await
                .map_err(|e| mutation_context(e, format!("unable to delete record {}", record.id)))?;
            report.deleted.push(record.address);
        }

        for address in &desired {
            if existing.contains(address) {
                report.unchanged.push(*address);
                continue;
            }

            let record = NewRecord::managed(domain, *address);
            info!("Creating {} record {} for {}", record.kind, address, domain);
            cancellable(cancel, self.provider.create_record(&zone, &record))
                .await
                .map_err(|e| mutation_context(e, format!("unable to create record for {}", address)))?;
            report.created.push(*address);
        }

        if report.is_noop() {
            debug!("{} already up to date ({} record(s))", domain, report.unchanged.len());
        }

        Ok(report)
    }
}

/// Race a provider call against cancellation
///
/// Losing the race drops the call's future, which aborts its request.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}

/// Add context to plain provider failures, leaving classified ones intact
fn mutation_context(err: Error, context: String) -> Error {
    match err {
        Error::Provider { message, .. } | Error::Http(message) | Error::Other(message) => {
            Error::mutation(format!("{}: {}", context, message))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_errors_keep_their_kind() {
        let err = mutation_context(Error::forbidden("nope"), "unable to delete".to_string());
        assert!(err.is_authorization());

        let err = mutation_context(
            Error::provider("cloudflare", "HTTP 500"),
            "unable to delete record abc".to_string(),
        );
        assert!(matches!(err, Error::Mutation(ref m) if m == "unable to delete record abc: HTTP 500"));
    }

    #[test]
    fn empty_report_is_noop() {
        assert!(ReconcileReport::default().is_noop());
    }
}
