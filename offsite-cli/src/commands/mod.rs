//! Subcommands and the argument groups they share.

pub mod bucket_name;
pub mod init;
pub mod plan;
pub mod run;
pub mod secrets;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use tokio_util::sync::CancellationToken;

use offsite_core::{settings, SecretId, Settings};
use offsite_secrets::{FileProvider, IbmSecretsManager, IbmSecretsManagerConfig, SecretProvider};

/// Secret id used when reading a local bundle file and none was given.
const LOCAL_SECRET_ID: &str = "local";

// ---------------------------------------------------------------------------
// Global flags
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Settings file to use instead of ~/.offsite/config.yaml.
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn load_settings(&self) -> Result<Settings> {
        match &self.settings {
            Some(path) => settings::load_from(path)
                .with_context(|| format!("failed to load settings from {}", path.display())),
            None => settings::load().context("failed to load ~/.offsite/config.yaml"),
        }
    }
}

// ---------------------------------------------------------------------------
// Secret source
// ---------------------------------------------------------------------------

/// Where the secret bundle comes from.
#[derive(Args, Debug, Clone)]
pub struct SecretSourceArgs {
    /// Identifier of the secret holding the bundle.
    #[arg(long, env = "SECRET_ID_PORTAL")]
    pub secret_id: Option<String>,

    /// IAM API key for Secrets Manager.
    #[arg(long, env = "SECRET_IBM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Secrets Manager instance URL.
    #[arg(long, env = "SECRETS_MANAGER_URL")]
    pub service_url: Option<String>,

    /// Read the bundle from a local YAML/JSON file instead of Secrets Manager.
    #[arg(long, value_name = "PATH")]
    pub secrets_file: Option<PathBuf>,
}

impl SecretSourceArgs {
    pub fn provider(&self, settings: &Settings) -> Result<Arc<dyn SecretProvider>> {
        if let Some(path) = &self.secrets_file {
            return Ok(Arc::new(FileProvider::new(path)));
        }
        let service_url = self
            .service_url
            .clone()
            .or_else(|| settings.secrets.service_url.clone())
            .context(
                "no Secrets Manager URL: pass --service-url, set SECRETS_MANAGER_URL \
                 or secrets.service_url in settings",
            )?;
        let api_key = self
            .api_key
            .clone()
            .context("no IAM API key: pass --api-key or set SECRET_IBM_API_KEY")?;
        let client = IbmSecretsManager::new(IbmSecretsManagerConfig {
            service_url,
            iam_url: settings.secrets.iam_url.clone(),
            api_key,
            timeout: Duration::from_secs(settings.secrets.timeout_secs),
        })?;
        Ok(Arc::new(client))
    }

    pub fn secret_id(&self, settings: &Settings) -> Result<SecretId> {
        if let Some(id) = self
            .secret_id
            .clone()
            .or_else(|| settings.secrets.secret_id.clone())
        {
            return Ok(SecretId(id));
        }
        if self.secrets_file.is_some() {
            return Ok(SecretId::from(LOCAL_SECRET_ID));
        }
        anyhow::bail!("no secret id: pass --secret-id, set SECRET_ID_PORTAL or secrets.secret_id")
    }
}

// ---------------------------------------------------------------------------
// Run-shaping flags
// ---------------------------------------------------------------------------

/// Flags shared by `run` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct RunShapeArgs {
    #[command(flatten)]
    pub source: SecretSourceArgs,

    /// Sync tool executable (overrides sync_tool.binary).
    #[arg(long, value_name = "PATH")]
    pub sync_tool: Option<PathBuf>,

    /// Pretend the run starts at this RFC 3339 instant.
    #[arg(long, value_parser = parse_instant)]
    pub at: Option<DateTime<Utc>>,
}

impl RunShapeArgs {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(binary) = &self.sync_tool {
            settings.sync_tool.binary = binary.clone();
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.at.unwrap_or_else(Utc::now)
    }
}

pub fn parse_instant(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("'{s}' is not an RFC 3339 timestamp ({e})"))
}

// ---------------------------------------------------------------------------
// Async plumbing
// ---------------------------------------------------------------------------

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

/// A token cancelled by the first Ctrl-C; the watcher task runs on `rt`.
pub fn cancel_on_ctrl_c(rt: &tokio::runtime::Runtime) -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current step");
            trigger.cancel();
        }
    });
    cancel
}
