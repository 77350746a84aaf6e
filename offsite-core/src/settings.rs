//! YAML settings for offsite runs.
//!
//! # Storage layout
//!
//! ```text
//! ~/.offsite/
//!   config.yaml   (mode 0600, written by `offsite init`)
//! ```
//!
//! Every field has a default, so a missing `config.yaml` is not an error and
//! partial files only override what they mention.
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::naming::{BucketNamer, SuffixMode};
use crate::policy::PolicyNames;
use crate::types::TransferTuning;

pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

// ---------------------------------------------------------------------------
// Settings sections
// ---------------------------------------------------------------------------

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub secrets: SecretsSettings,
    pub naming: NamingSettings,
    pub sync_tool: SyncToolSettings,
    pub transfer: TransferTuning,
    pub lifecycle: LifecycleSettings,
}

/// Where the Secret Bundle comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsSettings {
    /// Secrets Manager instance URL, e.g. `https://<id>.us-south.secrets-manager.appdomain.cloud`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    /// IAM token endpoint.
    pub iam_url: String,
    /// Identifier of the key/value secret holding the bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_id: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SecretsSettings {
    fn default() -> Self {
        Self {
            service_url: None,
            iam_url: DEFAULT_IAM_URL.to_owned(),
            secret_id: None,
            timeout_secs: 30,
        }
    }
}

/// Destination bucket naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingSettings {
    pub prefix: String,
    /// UTC offset whose calendar date names the bucket, e.g. `-05:00`.
    pub utc_offset: String,
    pub suffix: SuffixMode,
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            prefix: "backup".to_owned(),
            utc_offset: "-05:00".to_owned(),
            suffix: SuffixMode::None,
        }
    }
}

impl NamingSettings {
    pub fn offset(&self) -> Result<FixedOffset, SettingsError> {
        self.utc_offset
            .trim()
            .parse::<FixedOffset>()
            .map_err(|e| SettingsError::Invalid {
                field: "naming.utc_offset",
                reason: format!("'{}' is not an offset like -05:00 ({e})", self.utc_offset),
            })
    }

    pub fn namer(&self) -> Result<BucketNamer, SettingsError> {
        Ok(BucketNamer::new(self.prefix.clone(), self.offset()?, self.suffix))
    }
}

/// The external sync tool and the configuration file it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncToolSettings {
    /// Executable name or path.
    pub binary: PathBuf,
    /// Where the generated two-profile config is written.
    pub config_path: PathBuf,
    /// `provider` value written into both profiles.
    pub provider: String,
    pub source_profile: String,
    pub destination_profile: String,
    /// Directory of `.tera` files overriding the embedded config template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
    /// Delete the config file (it holds plaintext credentials) once the run ends.
    pub remove_config_after_run: bool,
}

impl Default for SyncToolSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("rclone"),
            config_path: PathBuf::from("rclone.conf"),
            provider: "IBMCOS".to_owned(),
            source_profile: "SOURCE".to_owned(),
            destination_profile: "DESTINATION".to_owned(),
            template_dir: None,
            remove_config_after_run: false,
        }
    }
}

/// Lifecycle policy naming and the S3 client region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    pub storage_class: String,
    pub archive_rule_id: String,
    pub expire_rule_id: String,
    /// Signing region for the lifecycle API client.
    pub region: String,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        let names = PolicyNames::default();
        Self {
            storage_class: names.storage_class,
            archive_rule_id: names.archive_rule_id,
            expire_rule_id: names.expire_rule_id,
            region: "us-standard".to_owned(),
        }
    }
}

impl LifecycleSettings {
    pub fn policy_names(&self) -> PolicyNames {
        PolicyNames {
            archive_rule_id: self.archive_rule_id.clone(),
            expire_rule_id: self.expire_rule_id.clone(),
            storage_class: self.storage_class.clone(),
        }
    }
}

impl Settings {
    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.naming.offset()?;
        if self.sync_tool.source_profile == self.sync_tool.destination_profile {
            return Err(SettingsError::Invalid {
                field: "sync_tool.destination_profile",
                reason: "must differ from sync_tool.source_profile".to_owned(),
            });
        }
        for (field, name) in [
            ("sync_tool.source_profile", &self.sync_tool.source_profile),
            ("sync_tool.destination_profile", &self.sync_tool.destination_profile),
        ] {
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(SettingsError::Invalid {
                    field,
                    reason: format!("'{name}' must be non-empty ASCII letters, digits, '_' or '-'"),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.offsite/config.yaml` — pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    home.join(".offsite").join("config.yaml")
}

fn home() -> Result<PathBuf, SettingsError> {
    dirs::home_dir().ok_or(SettingsError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load `<home>/.offsite/config.yaml`, or defaults if it does not exist.
pub fn load_at(home: &Path) -> Result<Settings, SettingsError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    load_from(&path)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, SettingsError> {
    load_at(&home()?)
}

/// Load an explicitly named settings file; absence is an error.
pub fn load_from(path: &Path) -> Result<Settings, SettingsError> {
    if !path.exists() {
        return Err(SettingsError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let settings: Settings = if contents.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(&contents).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?
    };
    settings.validate()?;
    Ok(settings)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Write `settings` to `<home>/.offsite/config.yaml` atomically (`.tmp` + rename).
///
/// Refuses to replace an existing file unless `force` is set.
pub fn save_at(home: &Path, settings: &Settings, force: bool) -> Result<PathBuf, SettingsError> {
    let path = settings_path_at(home);
    if path.exists() && !force {
        return Err(SettingsError::AlreadyExists { path });
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
        set_permissions(dir, 0o700)?;
    }

    let yaml = serde_yaml::to_string(settings)?;
    let tmp = path.with_file_name("config.yaml.tmp");
    std::fs::write(&tmp, yaml)?;
    set_permissions(&tmp, 0o600)?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings, force: bool) -> Result<PathBuf, SettingsError> {
    save_at(&home()?, settings, force)
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<(), SettingsError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let s = Settings::default();
        assert_eq!(s.naming.prefix, "backup");
        assert_eq!(s.naming.offset().unwrap(), FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(s.sync_tool.binary, PathBuf::from("rclone"));
        assert_eq!(s.sync_tool.config_path, PathBuf::from("rclone.conf"));
        assert_eq!(s.sync_tool.provider, "IBMCOS");
        assert_eq!(s.lifecycle.storage_class, "GLACIER");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let s: Settings = serde_yaml::from_str("naming:\n  suffix: clock-letter\n").unwrap();
        assert_eq!(s.naming.suffix, SuffixMode::ClockLetter);
        assert_eq!(s.naming.prefix, "backup");
        assert_eq!(s.transfer, TransferTuning::default());
    }

    #[test]
    fn bad_offset_is_invalid() {
        let mut s = Settings::default();
        s.naming.utc_offset = "lima".into();
        assert!(matches!(s.validate(), Err(SettingsError::Invalid { .. })));
    }

    #[test]
    fn identical_profiles_are_invalid() {
        let mut s = Settings::default();
        s.sync_tool.destination_profile = "SOURCE".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn profile_names_cannot_carry_colons() {
        let mut s = Settings::default();
        s.sync_tool.source_profile = "SRC:x".into();
        assert!(s.validate().is_err());
    }
}
