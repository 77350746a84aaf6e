//! Fakes shared by the offsite-sync integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use offsite_core::{keys, BucketName, LifecyclePolicy, SecretBundle, SecretId, Settings};
use offsite_secrets::{SecretError, SecretProvider};
use offsite_sync::{
    CopyMode, Invocation, LifecycleApi, LifecycleTarget, PolicyApplicationError, SyncTool,
    ToolError, ToolOutput,
};

pub fn reference_entries() -> Vec<(&'static str, &'static str)> {
    vec![
        (keys::SOURCE_ACCESS_KEY_ID, "a"),
        (keys::SOURCE_SECRET_ACCESS_KEY, "b"),
        (keys::SOURCE_ENDPOINT, "s3.src"),
        (keys::DESTINATION_ACCESS_KEY_ID, "c"),
        (keys::DESTINATION_SECRET_ACCESS_KEY, "d"),
        (keys::DESTINATION_ENDPOINT, "s3.dst"),
        (keys::ARCHIVE_AFTER_DAYS, "30"),
        (keys::DELETE_AFTER_DAYS, "90"),
        (keys::SOURCE_BUCKET, "prod-data"),
    ]
}

pub fn reference_bundle() -> SecretBundle {
    SecretBundle::from_iter(reference_entries())
}

pub fn bundle_without(key: &str) -> SecretBundle {
    SecretBundle::from_iter(reference_entries().into_iter().filter(|(k, _)| *k != key))
}

pub fn bundle_with(key: &'static str, value: &'static str) -> SecretBundle {
    bundle_overriding(&[(key, value)])
}

/// Reference bundle with some values replaced.
pub fn bundle_overriding(overrides: &[(&'static str, &'static str)]) -> SecretBundle {
    let mut entries = reference_entries();
    entries.retain(|(k, _)| overrides.iter().all(|(o, _)| o != k));
    entries.extend_from_slice(overrides);
    SecretBundle::from_iter(entries)
}

pub fn settings_in(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.sync_tool.config_path = dir.join("rclone.conf");
    settings
}

// ---------------------------------------------------------------------------
// Secret provider
// ---------------------------------------------------------------------------

/// Serves one bundle, or reports the secret as unknown.
pub struct MemoryProvider(pub Option<SecretBundle>);

impl SecretProvider for MemoryProvider {
    fn fetch(&self, id: &SecretId) -> Result<SecretBundle, SecretError> {
        self.0.clone().ok_or_else(|| SecretError::UnknownSecret { id: id.0.clone() })
    }

    fn describe(&self) -> String {
        "memory".to_owned()
    }
}

// ---------------------------------------------------------------------------
// Sync tool
// ---------------------------------------------------------------------------

/// Short label used to script responses: `mkdir`, `lsd SOURCE`,
/// `lsd DESTINATION`, `dry-run`, `copy`.
pub fn label(invocation: &Invocation) -> String {
    match invocation {
        Invocation::Mkdir { .. } => "mkdir".to_owned(),
        Invocation::Lsd { target } => format!("lsd {}", target.profile),
        Invocation::Copy {
            mode: CopyMode::DryRun,
            ..
        } => "dry-run".to_owned(),
        Invocation::Copy {
            mode: CopyMode::Real,
            ..
        } => "copy".to_owned(),
    }
}

/// Records invocations; answers with exit 0 unless scripted otherwise.
#[derive(Default)]
pub struct FakeTool {
    calls: Mutex<Vec<Invocation>>,
    scripted: Mutex<Vec<(String, i32, String)>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer invocations labelled `label` with `status` and `stderr`.
    pub fn respond(self, label: &str, status: i32, stderr: &str) -> Self {
        self.scripted
            .lock()
            .unwrap()
            .push((label.to_owned(), status, stderr.to_owned()));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().iter().map(label).collect()
    }
}

#[async_trait]
impl SyncTool for FakeTool {
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                command: invocation.to_string(),
            });
        }
        self.calls.lock().unwrap().push(invocation.clone());
        let wanted = label(invocation);
        let (status, stderr) = self
            .scripted
            .lock()
            .unwrap()
            .iter()
            .find(|(l, _, _)| *l == wanted)
            .map(|(_, s, e)| (*s, e.clone()))
            .unwrap_or((0, String::new()));
        let stderr = if stderr.is_empty() && matches!(invocation, Invocation::Copy { .. }) {
            "Checks:                 2 / 2, 100%\nTransferred:            3 / 3, 100%\n".to_owned()
        } else {
            stderr
        };
        Ok(ToolOutput {
            status: Some(status),
            stdout: String::new(),
            stderr,
            elapsed: Duration::from_millis(10),
        })
    }
}

// ---------------------------------------------------------------------------
// Lifecycle API
// ---------------------------------------------------------------------------

/// Records calls; optionally rejects every one.
#[derive(Default)]
pub struct FakeLifecycle {
    pub reject: bool,
    calls: Mutex<Vec<(LifecycleTarget, String, LifecyclePolicy)>>,
}

impl FakeLifecycle {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(LifecycleTarget, String, LifecyclePolicy)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LifecycleApi for FakeLifecycle {
    async fn put_policy(
        &self,
        target: &LifecycleTarget,
        bucket: &BucketName,
        policy: &LifecyclePolicy,
    ) -> Result<(), PolicyApplicationError> {
        self.calls
            .lock()
            .unwrap()
            .push((target.clone(), bucket.to_string(), policy.clone()));
        if self.reject {
            return Err(PolicyApplicationError::Rejected {
                bucket: bucket.to_string(),
                code: Some("AccessDenied".into()),
                message: "Access Denied".into(),
            });
        }
        Ok(())
    }
}
