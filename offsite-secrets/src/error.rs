//! Error types for offsite-secrets.

use std::path::PathBuf;

use thiserror::Error;

/// Every way a secret fetch can fail.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Transport failure: DNS, TLS, connection refused, timeout.
    #[error("secret provider unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The IAM token exchange was refused.
    #[error("authentication with {url} failed (HTTP {status}): {body}")]
    Authentication {
        url: String,
        status: u16,
        body: String,
    },

    /// The provider has no secret with this identifier.
    #[error("secret '{id}' not found")]
    UnknownSecret { id: String },

    /// Any other non-success HTTP status.
    #[error("secret provider returned HTTP {status} for {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    /// The response is not a flat key/value mapping.
    #[error("secret payload is malformed: {0}")]
    MalformedPayload(String),

    /// The provider is missing connection details.
    #[error("secret provider is not configured: {0}")]
    NotConfigured(String),

    /// Local bundle file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Local bundle file is not valid YAML/JSON.
    #[error("failed to parse secrets file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
