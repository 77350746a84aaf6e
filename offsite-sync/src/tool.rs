//! Sync tool invocation.
//!
//! [`Invocation`] is the closed set of commands a run issues; [`SyncTool`]
//! executes one and captures its exit status and output. Arguments are always
//! passed as a structured argv, never through a shell.
//!
//! Output is streamed line by line into `tracing` while the process runs:
//! `ERROR` lines at warn, `NOTICE` lines (the dry-run preview) at info, the
//! rest at debug. Only the last [`RETAINED_LINES`] of each stream are kept.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use offsite_core::{settings::SyncToolSettings, RemotePath, TransferTuning};

use crate::error::ToolError;

/// Lines of captured output quoted back in error messages.
const TAIL_LINES: usize = 20;

/// Lines of each output stream kept in a [`ToolOutput`].
pub const RETAINED_LINES: usize = 200;

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Whether a copy only reports what it would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    DryRun,
    Real,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Create a bucket.
    Mkdir { target: RemotePath },
    /// List the buckets/directories under a path; used as a reachability check.
    Lsd { target: RemotePath },
    /// Copy every object from one bucket into another.
    Copy {
        from: RemotePath,
        to: RemotePath,
        tuning: TransferTuning,
        mode: CopyMode,
    },
}

impl Invocation {
    /// Full argv (without the binary) for this invocation.
    pub fn args(&self, config_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        match self {
            Invocation::Mkdir { target } => {
                args.push("mkdir".into());
                args.push(target.to_string().into());
            }
            Invocation::Lsd { target } => {
                args.push("lsd".into());
                args.push(target.to_string().into());
            }
            Invocation::Copy {
                from,
                to,
                tuning,
                mode,
            } => {
                if *mode == CopyMode::DryRun {
                    args.push("--dry-run".into());
                }
                args.push("copy".into());
                args.push(from.to_string().into());
                args.push(to.to_string().into());
                for (flag, value) in [
                    ("--checkers", tuning.checkers),
                    ("--transfers", tuning.transfers),
                    ("--multi-thread-streams", tuning.multi_thread_streams),
                    ("--s3-upload-concurrency", tuning.s3_upload_concurrency),
                ] {
                    args.push(flag.into());
                    args.push(value.to_string().into());
                }
                args.push("-vv".into());
                if *mode == CopyMode::Real {
                    args.push("--checksum".into());
                }
            }
        }
        args.push("--config".into());
        args.push(config_path.as_os_str().to_owned());
        args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Mkdir { target } => write!(f, "mkdir {target}"),
            Invocation::Lsd { target } => write!(f, "lsd {target}"),
            Invocation::Copy {
                from,
                to,
                mode: CopyMode::DryRun,
                ..
            } => write!(f, "dry-run copy {from} -> {to}"),
            Invocation::Copy {
                from,
                to,
                mode: CopyMode::Real,
                ..
            } => write!(f, "copy {from} -> {to}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// What a finished sync tool process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    /// Last [`RETAINED_LINES`] lines of stdout.
    pub stdout: String,
    /// Last [`RETAINED_LINES`] lines of stderr.
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Last lines of stderr (or stdout when stderr is empty), for error messages.
    pub fn tail(&self) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let lines: Vec<&str> = source.trim_end().lines().collect();
        let start = lines.len().saturating_sub(TAIL_LINES);
        lines[start..].join("\n")
    }

    /// stdout and stderr together, for marker searches.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

// ---------------------------------------------------------------------------
// SyncTool
// ---------------------------------------------------------------------------

/// Something that can execute an [`Invocation`].
#[async_trait]
pub trait SyncTool: Send + Sync {
    /// Run to completion, or until `cancel` fires.
    ///
    /// A non-zero exit is *not* an error here; callers classify it.
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError>;
}

/// The `rclone` executable.
#[derive(Debug, Clone)]
pub struct Rclone {
    binary: PathBuf,
    config_path: PathBuf,
}

impl Rclone {
    pub fn new(binary: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_path: config_path.into(),
        }
    }

    pub fn from_settings(settings: &SyncToolSettings) -> Self {
        Self::new(&settings.binary, &settings.config_path)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Human-readable command line, e.g. for `offsite plan`.
    pub fn command_line(&self, invocation: &Invocation) -> String {
        std::iter::once(self.binary.as_os_str().to_owned())
            .chain(invocation.args(&self.config_path))
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl SyncTool for Rclone {
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let command = self.command_line(invocation);
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled { command });
        }
        debug!("running: {command}");

        let started = Instant::now();
        let mut child = Command::new(&self.binary)
            .args(invocation.args(&self.config_path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let process = &mut child;
        let work = async move {
            tokio::join!(
                drain(stdout, invocation),
                drain(stderr, invocation),
                process.wait()
            )
        };
        let finished = tokio::select! {
            _ = cancel.cancelled() => None,
            done = work => Some(done),
        };
        let Some((stdout, stderr, status)) = finished else {
            warn!("cancelling: {invocation}");
            let _ = child.start_kill();
            return Err(ToolError::Cancelled { command });
        };

        let io = |source: std::io::Error| ToolError::Io {
            command: command.clone(),
            source,
        };
        let result = ToolOutput {
            status: status.map_err(io)?.code(),
            stdout: stdout.map_err(io)?,
            stderr: stderr.map_err(io)?,
            elapsed: started.elapsed(),
        };
        debug!(
            "{invocation} finished with {:?} after {:.1}s",
            result.status,
            result.elapsed.as_secs_f64()
        );
        Ok(result)
    }
}

/// Log every line of `stream` and return the last [`RETAINED_LINES`].
async fn drain<R>(stream: Option<R>, invocation: &Invocation) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return Ok(String::new());
    };
    let mut reader = BufReader::new(stream);
    let mut kept: VecDeque<String> = VecDeque::with_capacity(RETAINED_LINES);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\r', '\n'])
            .to_owned();
        log_line(invocation, &line);
        if kept.len() == RETAINED_LINES {
            kept.pop_front();
        }
        kept.push_back(line);
    }
    let mut text = String::new();
    for line in kept {
        text.push_str(&line);
        text.push('\n');
    }
    Ok(text)
}

fn log_line(invocation: &Invocation, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    if line.contains("ERROR") {
        warn!("[{invocation}] {line}");
    } else if line.contains("NOTICE") {
        info!("[{invocation}] {line}");
    } else {
        debug!("[{invocation}] {line}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use offsite_core::BucketName;

    use super::*;

    fn path(profile: &str, bucket: &str) -> RemotePath {
        RemotePath::new(profile, BucketName::parse(bucket).unwrap())
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn mkdir_and_lsd_argv() {
        let cfg = Path::new("rclone.conf");
        let mkdir = Invocation::Mkdir {
            target: path("DESTINATION", "backup-2024-03-15"),
        };
        assert_eq!(
            strings(mkdir.args(cfg)),
            ["mkdir", "DESTINATION:backup-2024-03-15", "--config", "rclone.conf"]
        );
        let lsd = Invocation::Lsd {
            target: path("SOURCE", "prod-data"),
        };
        assert_eq!(
            strings(lsd.args(cfg)),
            ["lsd", "SOURCE:prod-data", "--config", "rclone.conf"]
        );
    }

    #[test]
    fn dry_run_copy_argv() {
        let inv = Invocation::Copy {
            from: path("SOURCE", "prod-data"),
            to: path("DESTINATION", "backup-2024-03-15"),
            tuning: TransferTuning::default(),
            mode: CopyMode::DryRun,
        };
        assert_eq!(
            strings(inv.args(Path::new("/tmp/r.conf"))),
            [
                "--dry-run",
                "copy",
                "SOURCE:prod-data",
                "DESTINATION:backup-2024-03-15",
                "--checkers",
                "64",
                "--transfers",
                "128",
                "--multi-thread-streams",
                "4",
                "--s3-upload-concurrency",
                "4",
                "-vv",
                "--config",
                "/tmp/r.conf"
            ]
        );
    }

    #[test]
    fn real_copy_argv_has_checksum_and_custom_tuning() {
        let tuning = TransferTuning {
            checkers: NonZeroU32::new(8).unwrap(),
            transfers: NonZeroU32::new(16).unwrap(),
            ..TransferTuning::default()
        };
        let inv = Invocation::Copy {
            from: path("SOURCE", "prod-data"),
            to: path("DESTINATION", "backup-2024-03-15"),
            tuning,
            mode: CopyMode::Real,
        };
        let args = strings(inv.args(Path::new("rclone.conf")));
        assert_eq!(args[0], "copy");
        assert!(!args.contains(&"--dry-run".to_owned()));
        let vv = args.iter().position(|a| a == "-vv").unwrap();
        assert_eq!(args[vv + 1], "--checksum");
        assert_eq!(args[args.len() - 2], "--config");
        let checkers = args.iter().position(|a| a == "--checkers").unwrap();
        assert_eq!(args[checkers + 1], "8");
        let transfers = args.iter().position(|a| a == "--transfers").unwrap();
        assert_eq!(args[transfers + 1], "16");
    }

    #[test]
    fn command_line_starts_with_binary() {
        let tool = Rclone::new("/usr/bin/rclone", "rclone.conf");
        let line = tool.command_line(&Invocation::Lsd {
            target: path("SOURCE", "prod-data"),
        });
        assert_eq!(line, "/usr/bin/rclone lsd SOURCE:prod-data --config rclone.conf");
    }

    #[test]
    fn tail_prefers_stderr_and_keeps_last_lines() {
        let stderr: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        let out = ToolOutput {
            status: Some(1),
            stdout: "ignored".into(),
            stderr,
            elapsed: Duration::ZERO,
        };
        let tail = out.tail();
        assert!(tail.starts_with("line 11"));
        assert!(tail.ends_with("line 30"));

        let quiet = ToolOutput {
            stderr: String::new(),
            stdout: "only stdout".into(),
            ..out
        };
        assert_eq!(quiet.tail(), "only stdout");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let tool = Rclone::new("/nonexistent/offsite-test-rclone", "rclone.conf");
        let err = tool
            .run(
                &Invocation::Lsd {
                    target: path("SOURCE", "prod-data"),
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_spawn() {
        let tool = Rclone::new("/nonexistent/offsite-test-rclone", "rclone.conf");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = tool
            .run(
                &Invocation::Lsd {
                    target: path("SOURCE", "prod-data"),
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled { .. }));
    }
}
