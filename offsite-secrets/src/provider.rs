//! The secret-retrieval seam.

use offsite_core::{SecretBundle, SecretId};

use crate::error::SecretError;

/// Fetches a flat key/value bundle by identifier.
///
/// Implementations block; async callers run them on a blocking thread.
pub trait SecretProvider: Send + Sync {
    fn fetch(&self, id: &SecretId) -> Result<SecretBundle, SecretError>;

    /// Human-readable description for logs (never includes credentials).
    fn describe(&self) -> String;
}
