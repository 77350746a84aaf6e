//! Remote verification, dry-run copy and real copy.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use offsite_core::{Remote, RemotePath, TransferTuning};

use crate::error::TransferError;
use crate::tool::{CopyMode, Invocation, SyncTool};

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Counters from the sync tool's final statistics block; `None` when the
/// line was absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStats {
    pub transferred_files: Option<u64>,
    pub checks: Option<u64>,
    pub errors: Option<u64>,
}

/// Parse the last statistics block in `output`.
///
/// ```text
/// Transferred:   	   10.234 MiB / 10.234 MiB, 100%, 1.2 MiB/s, ETA 0s
/// Errors:                 1 (retrying may help)
/// Checks:                 5 / 5, 100%
/// Transferred:            3 / 3, 100%
/// ```
///
/// The byte-count `Transferred:` line carries units and is skipped.
pub fn parse_stats(output: &str) -> TransferStats {
    let mut stats = TransferStats::default();
    for line in output.lines() {
        // Log lines may carry a "<date> <time> INFO  : " prefix.
        let line = line.trim();
        if let Some(rest) = field(line, "Transferred:") {
            if let Some(n) = leading_count(rest) {
                stats.transferred_files = Some(n);
            }
        } else if let Some(rest) = field(line, "Checks:") {
            if let Some(n) = leading_count(rest) {
                stats.checks = Some(n);
            }
        } else if let Some(rest) = field(line, "Errors:") {
            if let Some(n) = rest.split_whitespace().next().and_then(|t| t.parse().ok()) {
                stats.errors = Some(n);
            }
        }
    }
    stats
}

fn field<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.find(label).map(|i| line[i + label.len()..].trim())
}

/// `"3 / 3, 100%"` → 3; `"10.234 MiB / …"` → None.
fn leading_count(rest: &str) -> Option<u64> {
    let (count, _) = rest.split_once(" / ")?;
    count.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Pass report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    DryRun,
    Copy,
}

/// Result of one copy pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub pass: Pass,
    pub status: Option<i32>,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub stats: TransferStats,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Check each remote with `lsd`; the first non-zero exit fails.
pub async fn verify_remotes(
    tool: &dyn SyncTool,
    remotes: &[(Remote, &RemotePath)],
    cancel: &CancellationToken,
) -> Result<(), TransferError> {
    for (remote, path) in remotes {
        let invocation = Invocation::Lsd {
            target: (*path).clone(),
        };
        let output = tool.run(&invocation, cancel).await?;
        if !output.success() {
            error!("{remote} remote {path} is not reachable");
            return Err(TransferError::Unreachable {
                remote: *remote,
                path: path.to_string(),
                status: output.status,
                detail: output.tail(),
            });
        }
        info!("{remote} remote {path} reachable");
    }
    Ok(())
}

/// Run a dry-run or real copy from `from` into `to`.
pub async fn copy_pass(
    tool: &dyn SyncTool,
    from: &RemotePath,
    to: &RemotePath,
    tuning: TransferTuning,
    pass: Pass,
    cancel: &CancellationToken,
) -> Result<PassReport, TransferError> {
    let mode = match pass {
        Pass::DryRun => CopyMode::DryRun,
        Pass::Copy => CopyMode::Real,
    };
    let invocation = Invocation::Copy {
        from: from.clone(),
        to: to.clone(),
        tuning,
        mode,
    };
    info!("starting {invocation}");
    let output = tool.run(&invocation, cancel).await?;
    let stats = parse_stats(&output.combined());

    if !output.success() {
        error!("{invocation} failed with {:?}", output.status);
        let detail = output.tail();
        return Err(match pass {
            Pass::DryRun => TransferError::DryRun {
                status: output.status,
                detail,
            },
            Pass::Copy => TransferError::Copy {
                status: output.status,
                detail,
            },
        });
    }

    if let Some(errors) = stats.errors.filter(|e| *e > 0) {
        warn!("{invocation} exited cleanly but reported {errors} errors");
    }
    info!(
        "{invocation} finished in {:.1}s ({} files transferred, {} checks)",
        output.elapsed.as_secs_f64(),
        stats.transferred_files.unwrap_or_default(),
        stats.checks.unwrap_or_default()
    );
    Ok(PassReport {
        pass,
        status: output.status,
        elapsed: output.elapsed,
        stats,
    })
}
