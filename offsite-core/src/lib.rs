//! offsite core library — domain types, settings, naming, lifecycle policy, errors.
//!
//! - [`types`] — validated newtypes and connection profiles
//! - [`bundle`] — the [`SecretBundle`] and its well-known keys
//! - [`naming`] — destination bucket names
//! - [`policy`] — retention window and lifecycle policy document
//! - [`settings`] — `~/.offsite/config.yaml` load / save
//! - [`error`] — error enums

pub mod bundle;
pub mod error;
pub mod naming;
pub mod policy;
pub mod settings;
pub mod types;

pub use bundle::{keys, SecretBundle};
pub use error::{
    BucketNameError, BundleError, PolicyValidationError, RetentionError, SettingsError,
};
pub use naming::{BucketNamer, SuffixMode};
pub use policy::{LifecyclePolicy, PolicyNames, RetentionWindow};
pub use settings::Settings;
pub use types::{BucketName, ConnectionProfile, Remote, RemotePath, SecretId, TransferTuning};
