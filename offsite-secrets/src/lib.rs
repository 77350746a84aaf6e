//! # offsite-secrets
//!
//! Secret Bundle retrieval. [`SecretProvider`] is the seam; the production
//! implementation talks to IBM Cloud Secrets Manager, and [`FileProvider`]
//! reads a local YAML/JSON mapping for offline runs.

pub mod error;
pub mod file;
pub mod ibm;
pub mod payload;
pub mod provider;

pub use error::SecretError;
pub use file::FileProvider;
pub use ibm::{request_iam_token, IbmSecretsManager, IbmSecretsManagerConfig};
pub use provider::SecretProvider;
