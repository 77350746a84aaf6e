//! The backup run: secrets → config → policy → buckets → provision → lifecycle
//! → verify → dry run → copy.
//!
//! Stages run strictly in sequence and the first failure halts the run. The
//! cancellation token is checked before every stage and handed to every
//! sync tool invocation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use offsite_core::policy::retention_from_bundle;
use offsite_core::{
    keys, BucketName, LifecyclePolicy, Remote, RemotePath, SecretBundle, SecretId, Settings,
};
use offsite_secrets::SecretProvider;

use crate::error::{ConfigurationError, FailureCause, PipelineError, Stage};
use crate::lifecycle::{apply_policy, LifecycleApi, LifecycleTarget};
use crate::provision::{create_bucket, ProvisionOutcome};
use crate::tool::{CopyMode, Invocation, SyncTool};
use crate::transfer::{copy_pass, verify_remotes, Pass, PassReport};
use crate::writer::{self, WriteResult};

// ---------------------------------------------------------------------------
// Inputs and reports
// ---------------------------------------------------------------------------

/// Per-run inputs that do not come from settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub secret_id: SecretId,
    /// The instant that names the destination bucket.
    pub started_at: DateTime<Utc>,
}

/// Timing and a one-line summary for a completed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub elapsed_ms: u64,
    pub detail: String,
}

/// Everything a successful run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub source: String,
    pub destination: String,
    pub config: WriteResult,
    pub provision: ProvisionOutcome,
    pub policy: LifecyclePolicy,
    pub dry_run: PassReport,
    pub copy: PassReport,
    pub stages: Vec<StageRecord>,
}

/// What a run would do, computed without side effects.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub source: RemotePath,
    pub destination: RemotePath,
    pub config_path: PathBuf,
    pub policy: LifecyclePolicy,
    pub lifecycle_endpoint: String,
    pub invocations: Vec<Invocation>,
}

// ---------------------------------------------------------------------------
// Stage bookkeeping
// ---------------------------------------------------------------------------

struct Progress<'c> {
    cancel: &'c CancellationToken,
    records: Vec<StageRecord>,
    current: Option<(Stage, Instant)>,
}

impl<'c> Progress<'c> {
    fn new(cancel: &'c CancellationToken) -> Self {
        Self {
            cancel,
            records: Vec::new(),
            current: None,
        }
    }

    fn enter(&mut self, stage: Stage) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            warn!("cancelled before stage {stage}");
            return Err(PipelineError::cancelled(stage));
        }
        info!("stage {stage}: starting");
        self.current = Some((stage, Instant::now()));
        Ok(())
    }

    fn done(&mut self, detail: impl Into<String>) {
        if let Some((stage, started)) = self.current.take() {
            let detail = detail.into();
            info!("stage {stage}: {detail}");
            self.records.push(StageRecord {
                stage,
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                detail,
            });
        }
    }
}

fn at<E: Into<FailureCause>>(stage: Stage) -> impl FnOnce(E) -> PipelineError {
    move |e| PipelineError::new(stage, e)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    settings: &'a Settings,
    secrets: Arc<dyn SecretProvider>,
    tool: &'a dyn SyncTool,
    lifecycle: &'a dyn LifecycleApi,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        secrets: Arc<dyn SecretProvider>,
        tool: &'a dyn SyncTool,
        lifecycle: &'a dyn LifecycleApi,
    ) -> Self {
        Self {
            settings,
            secrets,
            tool,
            lifecycle,
        }
    }

    /// Execute every stage. The sync tool config is removed afterwards when
    /// `sync_tool.remove_config_after_run` is set, whatever the outcome.
    pub async fn run(
        &self,
        opts: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let result = self.run_stages(opts, cancel).await;

        let sync = &self.settings.sync_tool;
        if sync.remove_config_after_run {
            if let Err(e) = writer::remove_sync_config(&sync.config_path) {
                warn!("could not remove sync tool config: {e}");
            }
        }

        match &result {
            Ok(report) => info!("backup of {} into {} complete", report.source, report.destination),
            Err(e) => error!("{e}"),
        }
        result
    }

    async fn run_stages(
        &self,
        opts: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let mut progress = Progress::new(cancel);
        let sync = &self.settings.sync_tool;

        progress.enter(Stage::FetchSecrets)?;
        let bundle = self.fetch_secrets(&opts.secret_id, cancel).await?;
        progress.done(format!("{} keys from {}", bundle.len(), self.secrets.describe()));

        progress.enter(Stage::WriteConfig)?;
        let content =
            writer::render_sync_config(&bundle, sync).map_err(at(Stage::WriteConfig))?;
        let config = writer::write_sync_config(&sync.config_path, &content)
            .map_err(at(Stage::WriteConfig))?;
        progress.done(match &config {
            WriteResult::Written { path } => format!("wrote {}", path.display()),
            WriteResult::Unchanged { path } => format!("{} unchanged", path.display()),
        });

        progress.enter(Stage::PreparePolicy)?;
        let (policy, target) = self.prepare_policy(&bundle).map_err(at(Stage::PreparePolicy))?;
        progress.done(format!(
            "archive after {} days, delete after {} days",
            policy.transition_days().unwrap_or_default(),
            policy.expiration_days().unwrap_or_default()
        ));

        progress.enter(Stage::ResolveBuckets)?;
        let (source, destination) = self
            .resolve_buckets(&bundle, opts.started_at)
            .map_err(at(Stage::ResolveBuckets))?;
        progress.done(format!("{source} -> {destination}"));

        progress.enter(Stage::CreateBucket)?;
        let provision = create_bucket(self.tool, &destination, cancel)
            .await
            .map_err(at(Stage::CreateBucket))?;
        progress.done(match provision {
            ProvisionOutcome::Created => format!("created {destination}"),
            ProvisionOutcome::AlreadyExists => format!("{destination} already existed"),
        });

        progress.enter(Stage::ApplyPolicy)?;
        tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::cancelled(Stage::ApplyPolicy)),
            applied = apply_policy(self.lifecycle, &target, &destination.bucket, &policy) => {
                applied.map_err(at(Stage::ApplyPolicy))?;
            }
        }
        progress.done(format!("applied via {}", target.endpoint));

        progress.enter(Stage::VerifyRemotes)?;
        verify_remotes(
            self.tool,
            &[(Remote::Source, &source), (Remote::Destination, &destination)],
            cancel,
        )
        .await
        .map_err(at(Stage::VerifyRemotes))?;
        progress.done("both remotes reachable");

        let tuning = self.settings.transfer;

        progress.enter(Stage::DryRun)?;
        let dry_run = copy_pass(self.tool, &source, &destination, tuning, Pass::DryRun, cancel)
            .await
            .map_err(at(Stage::DryRun))?;
        progress.done(pass_summary(&dry_run));

        progress.enter(Stage::Copy)?;
        let copy = copy_pass(self.tool, &source, &destination, tuning, Pass::Copy, cancel)
            .await
            .map_err(at(Stage::Copy))?;
        progress.done(pass_summary(&copy));

        Ok(RunReport {
            started_at: opts.started_at,
            source: source.to_string(),
            destination: destination.to_string(),
            config,
            provision,
            policy,
            dry_run,
            copy,
            stages: progress.records,
        })
    }

    /// Fetch secrets and resolve everything a run needs, without writing the
    /// config, creating buckets or spawning the sync tool.
    pub async fn plan(
        &self,
        opts: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<RunPlan, PipelineError> {
        let mut progress = Progress::new(cancel);
        let sync = &self.settings.sync_tool;

        progress.enter(Stage::FetchSecrets)?;
        let bundle = self.fetch_secrets(&opts.secret_id, cancel).await?;
        progress.done(format!("{} keys", bundle.len()));

        progress.enter(Stage::WriteConfig)?;
        writer::render_sync_config(&bundle, sync).map_err(at(Stage::WriteConfig))?;
        progress.done("config renders");

        progress.enter(Stage::PreparePolicy)?;
        let (policy, target) = self.prepare_policy(&bundle).map_err(at(Stage::PreparePolicy))?;
        progress.done("policy valid");

        progress.enter(Stage::ResolveBuckets)?;
        let (source, destination) = self
            .resolve_buckets(&bundle, opts.started_at)
            .map_err(at(Stage::ResolveBuckets))?;
        progress.done(format!("{source} -> {destination}"));

        let tuning = self.settings.transfer;
        let invocations = vec![
            Invocation::Mkdir {
                target: destination.clone(),
            },
            Invocation::Lsd {
                target: source.clone(),
            },
            Invocation::Lsd {
                target: destination.clone(),
            },
            Invocation::Copy {
                from: source.clone(),
                to: destination.clone(),
                tuning,
                mode: CopyMode::DryRun,
            },
            Invocation::Copy {
                from: source.clone(),
                to: destination.clone(),
                tuning,
                mode: CopyMode::Real,
            },
        ];

        Ok(RunPlan {
            source,
            destination,
            config_path: sync.config_path.clone(),
            policy,
            lifecycle_endpoint: target.endpoint,
            invocations,
        })
    }

    // -- stages -------------------------------------------------------------

    async fn fetch_secrets(
        &self,
        id: &SecretId,
        cancel: &CancellationToken,
    ) -> Result<SecretBundle, PipelineError> {
        let provider = Arc::clone(&self.secrets);
        let id = id.clone();
        let task = tokio::task::spawn_blocking(move || provider.fetch(&id));
        tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::cancelled(Stage::FetchSecrets)),
            joined = task => match joined {
                Ok(fetched) => fetched.map_err(at(Stage::FetchSecrets)),
                Err(e) => Err(PipelineError::new(
                    Stage::FetchSecrets,
                    FailureCause::Internal(format!("secret fetch task failed: {e}")),
                )),
            },
        }
    }

    fn prepare_policy(
        &self,
        bundle: &SecretBundle,
    ) -> Result<(LifecyclePolicy, LifecycleTarget), FailureCause> {
        let window = retention_from_bundle(bundle)?;
        let policy =
            LifecyclePolicy::archive_then_expire(window, &self.settings.lifecycle.policy_names())?;
        policy.validate()?;
        let target = LifecycleTarget::from_bundle(bundle, &self.settings.lifecycle.region)
            .map_err(ConfigurationError::from)?;
        Ok((policy, target))
    }

    fn resolve_buckets(
        &self,
        bundle: &SecretBundle,
        started_at: DateTime<Utc>,
    ) -> Result<(RemotePath, RemotePath), ConfigurationError> {
        let sync = &self.settings.sync_tool;
        let source_bucket = BucketName::parse(bundle.require(keys::SOURCE_BUCKET)?.trim())?;
        let destination_bucket = self.settings.naming.namer()?.name_at(started_at)?;
        Ok((
            RemotePath::new(&sync.source_profile, source_bucket),
            RemotePath::new(&sync.destination_profile, destination_bucket),
        ))
    }
}

fn pass_summary(report: &PassReport) -> String {
    format!(
        "{} files transferred, {} checks, {} errors in {:.1}s",
        report.stats.transferred_files.unwrap_or_default(),
        report.stats.checks.unwrap_or_default(),
        report.stats.errors.unwrap_or_default(),
        report.elapsed.as_secs_f64()
    )
}
