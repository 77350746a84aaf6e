//! Error types for offsite-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or saving [`Settings`](crate::settings::Settings).
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Underlying I/O failure (permission denied, unreadable file, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested settings file does not exist.
    #[error("settings not found at {path}")]
    NotFound { path: PathBuf },

    /// Refusing to overwrite an existing settings file.
    #[error("settings already exist at {path}; pass --force to overwrite")]
    AlreadyExists { path: PathBuf },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.offsite/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A field parsed but holds an unusable value.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised when a [`SecretBundle`](crate::SecretBundle) lacks what a stage needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    /// One or more required keys are absent or blank.
    #[error("secret bundle is missing required keys: {}", .keys.join(", "))]
    MissingKeys { keys: Vec<String> },

    /// A value is present but cannot be used as-is.
    #[error("secret bundle value for `{key}` is invalid: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// A string that does not satisfy S3 bucket naming rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid bucket name '{name}': {reason}")]
pub struct BucketNameError {
    pub name: String,
    pub reason: &'static str,
}

/// Retention windows rejected before any provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyValidationError {
    /// Objects would be deleted before (or as soon as) they are archived.
    #[error(
        "delete-after-days ({delete_after_days}) must be greater than \
         archive-after-days ({archive_after_days})"
    )]
    ExpiresBeforeArchive {
        archive_after_days: u32,
        delete_after_days: u32,
    },

    /// A day count that is not a non-negative integer the provider accepts.
    #[error("`{key}` must be a whole number of days between 0 and {max}, got '{value}'")]
    InvalidDays {
        key: String,
        value: String,
        max: i32,
    },

    /// Storage class or rule id left empty.
    #[error("lifecycle field `{field}` must not be empty")]
    EmptyField { field: &'static str },
}

/// Failure to read a retention window out of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetentionError {
    #[error(transparent)]
    Missing(#[from] BundleError),

    #[error(transparent)]
    Invalid(#[from] PolicyValidationError),
}
