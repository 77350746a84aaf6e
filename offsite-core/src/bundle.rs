//! The Secret Bundle: a flat, immutable key/value mapping fetched once per run.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::BundleError;

/// Well-known bundle keys.
pub mod keys {
    pub const SOURCE_ACCESS_KEY_ID: &str = "SOURCE_ACCESS_KEY_ID";
    pub const SOURCE_SECRET_ACCESS_KEY: &str = "SOURCE_SECRET_ACCESS_KEY";
    pub const SOURCE_ENDPOINT: &str = "SOURCE_ENDPOINT";
    pub const DESTINATION_ACCESS_KEY_ID: &str = "DESTINATION_ACCESS_KEY_ID";
    pub const DESTINATION_SECRET_ACCESS_KEY: &str = "DESTINATION_SECRET_ACCESS_KEY";
    pub const DESTINATION_ENDPOINT: &str = "DESTINATION_ENDPOINT";
    /// Days before objects move to the archive storage class.
    pub const ARCHIVE_AFTER_DAYS: &str = "DIAS_PARA_ARCHIVAR";
    /// Days before objects are deleted.
    pub const DELETE_AFTER_DAYS: &str = "DIAS_PARA_ELIMINAR";
    pub const SOURCE_BUCKET: &str = "COS_SOURCE_NAME";
    /// Management endpoint for lifecycle calls; falls back to `DESTINATION_ENDPOINT`.
    pub const COS_ENDPOINT: &str = "IBM_COS_ENDPOINT";
    pub const COS_API_KEY: &str = "IBM_COS_API_KEY";
    pub const SERVICE_INSTANCE_ID: &str = "IBM_SERVICE_INSTANCE_ID";

    /// Keys every run needs.
    pub const REQUIRED: &[&str] = &[
        SOURCE_ACCESS_KEY_ID,
        SOURCE_SECRET_ACCESS_KEY,
        SOURCE_ENDPOINT,
        DESTINATION_ACCESS_KEY_ID,
        DESTINATION_SECRET_ACCESS_KEY,
        DESTINATION_ENDPOINT,
        ARCHIVE_AFTER_DAYS,
        DELETE_AFTER_DAYS,
        SOURCE_BUCKET,
    ];

    /// Keys that are read when present.
    pub const OPTIONAL: &[&str] = &[COS_ENDPOINT, COS_API_KEY, SERVICE_INSTANCE_ID];
}

/// String-keyed secret values. `Debug` never prints values.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretBundle {
    values: BTreeMap<String, String>,
}

impl SecretBundle {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Value for `key`, treating blank strings as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Value for `key`, or [`BundleError::MissingKeys`] naming it.
    pub fn require(&self, key: &str) -> Result<&str, BundleError> {
        self.get(key).ok_or_else(|| BundleError::MissingKeys {
            keys: vec![key.to_owned()],
        })
    }

    /// Values for every key in `wanted`, in order. Reports all missing keys at once.
    pub fn require_all(&self, wanted: &[&str]) -> Result<Vec<&str>, BundleError> {
        let missing: Vec<String> = wanted
            .iter()
            .filter(|k| self.get(k).is_none())
            .map(|k| (*k).to_owned())
            .collect();
        if !missing.is_empty() {
            return Err(BundleError::MissingKeys { keys: missing });
        }
        Ok(wanted.iter().filter_map(|k| self.get(k)).collect())
    }

    /// Required keys (see [`keys::REQUIRED`]) that are absent or blank.
    pub fn missing_required(&self) -> Vec<&'static str> {
        keys::REQUIRED
            .iter()
            .copied()
            .filter(|k| self.get(k).is_none())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Key names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretBundle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}
