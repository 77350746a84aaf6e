//! Error types for offsite-sync.
//!
//! One enum per failing concern, wrapped by [`PipelineError`] together with
//! the [`Stage`] that raised it.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use offsite_core::{
    BucketNameError, BundleError, PolicyValidationError, RetentionError, SettingsError,
};
use offsite_renderer::RenderError;
use offsite_secrets::SecretError;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    FetchSecrets,
    WriteConfig,
    PreparePolicy,
    ResolveBuckets,
    CreateBucket,
    ApplyPolicy,
    VerifyRemotes,
    DryRun,
    Copy,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::FetchSecrets,
            Stage::WriteConfig,
            Stage::PreparePolicy,
            Stage::ResolveBuckets,
            Stage::CreateBucket,
            Stage::ApplyPolicy,
            Stage::VerifyRemotes,
            Stage::DryRun,
            Stage::Copy,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FetchSecrets => "fetch-secrets",
            Stage::WriteConfig => "write-config",
            Stage::PreparePolicy => "prepare-policy",
            Stage::ResolveBuckets => "resolve-buckets",
            Stage::CreateBucket => "create-bucket",
            Stage::ApplyPolicy => "apply-policy",
            Stage::VerifyRemotes => "verify-remotes",
            Stage::DryRun => "dry-run",
            Stage::Copy => "copy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Sync tool process
// ---------------------------------------------------------------------------

/// Failure to run the sync tool at all (as opposed to it exiting non-zero).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled while running `{command}`")]
    Cancelled { command: String },
}

/// Render a captured exit status; `None` means the process died from a signal.
pub fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "termination by signal".to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The bundle or settings cannot produce a usable sync tool configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("secret bundle is missing required keys: {}", .keys.join(", "))]
    MissingKeys { keys: Vec<String> },

    #[error("value for `{key}` is invalid: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("invalid bucket name: {0}")]
    BucketName(#[from] BucketNameError),

    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("cannot render sync tool config: {0}")]
    Render(#[source] RenderError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<BundleError> for ConfigurationError {
    fn from(e: BundleError) -> Self {
        match e {
            BundleError::MissingKeys { keys } => ConfigurationError::MissingKeys { keys },
            BundleError::InvalidValue { key, reason } => {
                ConfigurationError::InvalidValue { key, reason }
            }
        }
    }
}

impl From<RenderError> for ConfigurationError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::LineBreak { profile, field } => ConfigurationError::InvalidValue {
                key: format!("{profile}.{field}"),
                reason: "contains a line break".to_owned(),
            },
            other => ConfigurationError::Render(other),
        }
    }
}

/// Convenience constructor for [`ConfigurationError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigurationError {
    ConfigurationError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

/// Coarse classification of a rejected tool or API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Authentication,
    Network,
    /// The bucket name belongs to another account.
    NameTaken,
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Authentication => write!(f, "authentication failure"),
            FailureKind::Network => write!(f, "network failure"),
            FailureKind::NameTaken => write!(f, "name owned by another account"),
            FailureKind::Other => write!(f, "failure"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("creating bucket {bucket} failed ({kind}, {}): {detail}", describe_status(.status))]
    Rejected {
        bucket: String,
        kind: FailureKind,
        status: Option<i32>,
        detail: String,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PolicyApplicationError {
    #[error("lifecycle policy for bucket {bucket} was rejected{}: {message}",
        .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Rejected {
        bucket: String,
        code: Option<String>,
        message: String,
    },

    #[error("lifecycle policy could not be encoded: {0}")]
    Encoding(String),

    /// `IBM_COS_API_KEY` could not be exchanged for a bearer token.
    #[error("IAM token for the lifecycle call is unavailable: {0}")]
    Token(String),
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("{remote} remote {path} is unreachable ({}): {detail}", describe_status(.status))]
    Unreachable {
        remote: offsite_core::Remote,
        path: String,
        status: Option<i32>,
        detail: String,
    },

    #[error("dry run failed ({}): {detail}", describe_status(.status))]
    DryRun { status: Option<i32>, detail: String },

    #[error("copy failed ({}): {detail}", describe_status(.status))]
    Copy { status: Option<i32>, detail: String },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Why a stage failed.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("secret retrieval failed: {0}")]
    SecretRetrieval(#[from] SecretError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("bucket provisioning failed: {0}")]
    BucketProvisioning(ProvisionError),

    #[error("invalid lifecycle policy: {0}")]
    PolicyValidation(#[from] PolicyValidationError),

    #[error("lifecycle policy application failed: {0}")]
    PolicyApplication(#[from] PolicyApplicationError),

    #[error("transfer failed: {0}")]
    Transfer(TransferError),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RetentionError> for FailureCause {
    fn from(e: RetentionError) -> Self {
        match e {
            RetentionError::Missing(missing) => FailureCause::Configuration(missing.into()),
            RetentionError::Invalid(invalid) => FailureCause::PolicyValidation(invalid),
        }
    }
}

impl From<ProvisionError> for FailureCause {
    fn from(e: ProvisionError) -> Self {
        match e {
            ProvisionError::Tool(ToolError::Cancelled { .. }) => FailureCause::Cancelled,
            other => FailureCause::BucketProvisioning(other),
        }
    }
}

impl From<TransferError> for FailureCause {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Tool(ToolError::Cancelled { .. }) => FailureCause::Cancelled,
            other => FailureCause::Transfer(other),
        }
    }
}

/// A run halted at `stage`.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {cause}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub cause: FailureCause,
}

impl PipelineError {
    pub fn new(stage: Stage, cause: impl Into<FailureCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    pub fn cancelled(stage: Stage) -> Self {
        Self {
            stage,
            cause: FailureCause::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, FailureCause::Cancelled)
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match &self.cause {
            FailureCause::SecretRetrieval(_) => 10,
            FailureCause::Configuration(_) => 11,
            FailureCause::BucketProvisioning(_) => 12,
            FailureCause::PolicyValidation(_) => 13,
            FailureCause::PolicyApplication(_) => 14,
            FailureCause::Transfer(TransferError::Unreachable { .. }) => 15,
            FailureCause::Transfer(TransferError::DryRun { .. }) => 16,
            FailureCause::Transfer(TransferError::Copy { .. }) => 17,
            FailureCause::Transfer(TransferError::Tool(_)) => match self.stage {
                Stage::VerifyRemotes => 15,
                Stage::DryRun => 16,
                _ => 17,
            },
            FailureCause::Cancelled => 130,
            FailureCause::Internal(_) => 1,
        }
    }
}
