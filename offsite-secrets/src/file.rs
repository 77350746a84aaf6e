//! Local YAML/JSON bundle file provider.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use offsite_core::{SecretBundle, SecretId};

use crate::error::SecretError;
use crate::payload::bundle_from_document;
use crate::provider::SecretProvider;

/// Reads a flat mapping, or a saved Secrets Manager response, from disk.
/// The secret id is ignored.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretProvider for FileProvider {
    fn fetch(&self, id: &SecretId) -> Result<SecretBundle, SecretError> {
        debug!("reading secret '{}' from {}", id, self.path.display());
        let contents = std::fs::read_to_string(&self.path).map_err(|source| SecretError::Io {
            path: self.path.clone(),
            source,
        })?;
        // serde_yaml reads JSON documents as well.
        let value: Value = serde_yaml::from_str(&contents).map_err(|source| SecretError::Parse {
            path: self.path.clone(),
            source,
        })?;
        bundle_from_document(&value)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
