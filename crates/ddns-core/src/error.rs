//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the workspace.
//!
//! Lookups aggregate their failures instead of short-circuiting, so several
//! errors frequently travel together as [`Error::Multiple`]. Classification
//! helpers such as [`Error::is_fatal`] look through those lists and through
//! the orchestrator's context wrappers.

use std::fmt;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed address or URL literal
    #[error("Parse error: {0}")]
    Parse(String),

    /// A single public lookup endpoint failed
    #[error("Lookup via {endpoint} failed: {message}")]
    Lookup {
        /// Endpoint that was queried
        endpoint: String,
        /// What went wrong
        message: String,
    },

    /// Fewer lookups succeeded than the quorum requires
    #[error("not enough endpoints responded without errors ({received} of {required} required): {failures}")]
    InsufficientResponses {
        /// Successful responses needed for agreement
        required: usize,
        /// Successful responses actually received
        received: usize,
        /// Every individual lookup failure
        failures: ErrorList,
    },

    /// Enough lookups succeeded but none agreed with the first
    #[error("lookup endpoints did not agree on our address{}", failure_suffix(.failures))]
    Disagreement {
        /// Lookup failures encountered along the way
        failures: ErrorList,
    },

    /// The provider-side zone for a domain could not be determined
    #[error("Zone lookup failed: {0}")]
    ZoneLookup(String),

    /// A create or delete call against the provider failed
    #[error("Record mutation failed: {0}")]
    Mutation(String),

    /// Authentication errors (credentials rejected outright)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors (valid credentials, insufficient permission)
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The governing cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// Several errors joined together
    #[error("{0}")]
    Multiple(ErrorList),

    /// Address resolution failed for a cycle
    #[error("error getting addresses: {0}")]
    Resolve(#[source] Box<Error>),

    /// Reconciliation failed for a domain
    #[error("error updating {domain}: {source}")]
    Update {
        /// Domain being reconciled
        domain: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn failure_suffix(failures: &ErrorList) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(" (lookup failures: {})", failures)
    }
}

/// An ordered list of errors that display as one
#[derive(Debug, Default)]
pub struct ErrorList(pub Vec<Error>);

impl ErrorList {
    /// Number of errors in the list
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the contained errors
    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }
}

impl From<Vec<Error>> for ErrorList {
    fn from(errors: Vec<Error>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a lookup error for one endpoint
    pub fn lookup(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lookup {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a zone lookup error
    pub fn zone_lookup(msg: impl Into<String>) -> Self {
        Self::ZoneLookup(msg.into())
    }

    /// Create a record mutation error
    pub fn mutation(msg: impl Into<String>) -> Self {
        Self::Mutation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an authorization error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Join a list of errors into one
    ///
    /// Returns `None` for an empty list and the error itself for a
    /// single-element list.
    pub fn join(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(ErrorList(errors))),
        }
    }

    /// Whether this error (or any error it carries) is an authentication failure
    pub fn is_authentication(&self) -> bool {
        self.any(&|e| matches!(e, Error::Authentication(_)))
    }

    /// Whether this error (or any error it carries) is an authorization failure
    pub fn is_authorization(&self) -> bool {
        self.any(&|e| matches!(e, Error::Authorization(_)))
    }

    /// Whether a repeating daemon should stop instead of retrying
    pub fn is_fatal(&self) -> bool {
        self.is_authentication() || self.is_authorization()
    }

    fn any(&self, pred: &dyn Fn(&Error) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Error::Multiple(list)
            | Error::InsufficientResponses { failures: list, .. }
            | Error::Disagreement { failures: list } => list.iter().any(|e| e.any(pred)),
            Error::Resolve(inner) => inner.any(pred),
            Error::Update { source, .. } => source.any(pred),
            _ => false,
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
