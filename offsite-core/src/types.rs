//! Domain types shared by every offsite crate.
//!
//! Names that travel into subprocess arguments (bucket names, profile names)
//! are validated newtypes; credentials stay plain `String`s inside
//! [`ConnectionProfile`] and never implement `Display`.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::bundle::{keys, SecretBundle};
use crate::error::{BucketNameError, BundleError};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque identifier of a secret in the secret store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretId(pub String);

impl fmt::Display for SecretId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SecretId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A bucket name that satisfies S3 naming rules.
///
/// 3–63 characters of lowercase ASCII letters, digits, `-` and `.`, starting
/// and ending with a letter or digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BucketName(String);

impl BucketName {
    pub fn parse(name: impl Into<String>) -> Result<Self, BucketNameError> {
        let name = name.into();
        let err = |reason| BucketNameError {
            name: name.clone(),
            reason,
        };

        if name.len() < 3 || name.len() > 63 {
            return Err(err("must be between 3 and 63 characters long"));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
        {
            return Err(err(
                "only lowercase letters, digits, '-' and '.' are allowed",
            ));
        }
        let bytes = name.as_bytes();
        let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
        if !edge_ok(bytes[0]) || !edge_ok(bytes[bytes.len() - 1]) {
            return Err(err("must start and end with a letter or digit"));
        }
        if name.contains("..") {
            return Err(err("must not contain consecutive dots"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for BucketName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BucketName::parse(raw).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Remotes
// ---------------------------------------------------------------------------

/// One of the two storage endpoints a run touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Remote {
    Source,
    Destination,
}

impl Remote {
    /// Bundle keys holding this remote's access key id, secret key and endpoint.
    pub fn credential_keys(&self) -> [&'static str; 3] {
        match self {
            Remote::Source => [
                keys::SOURCE_ACCESS_KEY_ID,
                keys::SOURCE_SECRET_ACCESS_KEY,
                keys::SOURCE_ENDPOINT,
            ],
            Remote::Destination => [
                keys::DESTINATION_ACCESS_KEY_ID,
                keys::DESTINATION_SECRET_ACCESS_KEY,
                keys::DESTINATION_ENDPOINT,
            ],
        }
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remote::Source => write!(f, "source"),
            Remote::Destination => write!(f, "destination"),
        }
    }
}

/// `<profile>:<bucket>` address understood by the sync tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub profile: String,
    pub bucket: BucketName,
}

impl RemotePath {
    pub fn new(profile: impl Into<String>, bucket: BucketName) -> Self {
        Self {
            profile: profile.into(),
            bucket,
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.profile, self.bucket)
    }
}

// ---------------------------------------------------------------------------
// Connection profiles
// ---------------------------------------------------------------------------

/// Credentials and endpoint for one remote, lifted out of a [`SecretBundle`].
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub remote: Remote,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: String,
}

impl ConnectionProfile {
    /// Build the profile for `remote`, or report every missing key.
    pub fn from_bundle(bundle: &SecretBundle, remote: Remote) -> Result<Self, BundleError> {
        let [key_id, secret, endpoint] = remote.credential_keys();
        let values = bundle.require_all(&[key_id, secret, endpoint])?;
        Ok(Self {
            remote,
            access_key_id: values[0].to_owned(),
            secret_access_key: values[1].to_owned(),
            endpoint: values[2].to_owned(),
        })
    }

    /// Both profiles at once; missing keys from both remotes are reported together.
    pub fn pair_from_bundle(bundle: &SecretBundle) -> Result<(Self, Self), BundleError> {
        let mut all = Remote::Source.credential_keys().to_vec();
        all.extend(Remote::Destination.credential_keys());
        bundle.require_all(&all)?;
        Ok((
            Self::from_bundle(bundle, Remote::Source)?,
            Self::from_bundle(bundle, Remote::Destination)?,
        ))
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("remote", &self.remote)
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Transfer tuning
// ---------------------------------------------------------------------------

/// Concurrency flags passed to every copy pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferTuning {
    /// Parallel verification threads (`--checkers`).
    pub checkers: NonZeroU32,
    /// Objects transferred in parallel (`--transfers`).
    pub transfers: NonZeroU32,
    /// Parallel download streams per large object (`--multi-thread-streams`).
    pub multi_thread_streams: NonZeroU32,
    /// Parallel multipart upload parts (`--s3-upload-concurrency`).
    pub s3_upload_concurrency: NonZeroU32,
}

impl Default for TransferTuning {
    fn default() -> Self {
        Self {
            checkers: NonZeroU32::new(64).unwrap_or(NonZeroU32::MIN),
            transfers: NonZeroU32::new(128).unwrap_or(NonZeroU32::MIN),
            multi_thread_streams: NonZeroU32::new(4).unwrap_or(NonZeroU32::MIN),
            s3_upload_concurrency: NonZeroU32::new(4).unwrap_or(NonZeroU32::MIN),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
