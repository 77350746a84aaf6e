//! Destination bucket creation.
//!
//! Creating a bucket this account already owns is not a failure. A name held
//! by another account is: the bucket cannot be written to, so the run stops
//! here. Remaining failures are classified by authentication and network
//! markers in the tool's output.

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use offsite_core::RemotePath;

use crate::error::{FailureKind, ProvisionError};
use crate::tool::{Invocation, SyncTool, ToolOutput};

const OWNED_MARKERS: &[&str] = &["bucketalreadyownedbyyou", "already owned by you"];

const NAME_TAKEN_MARKERS: &[&str] = &[
    "bucketalreadyexists",
    "bucket name is not available",
    "already exists",
];

const AUTH_MARKERS: &[&str] = &[
    "accessdenied",
    "access denied",
    "invalidaccesskeyid",
    "signaturedoesnotmatch",
    "forbidden",
    "unauthorized",
    "403",
];

const NETWORK_MARKERS: &[&str] = &[
    "no such host",
    "connection refused",
    "connection reset",
    "network is unreachable",
    "i/o timeout",
    "timeout",
    "tls handshake",
    "dial tcp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}

fn mentions_owned(text: &str) -> bool {
    OWNED_MARKERS.iter().any(|m| text.contains(m))
}

/// Classify a failed call from its output.
pub fn classify_failure(text: &str) -> FailureKind {
    let lower = text.to_ascii_lowercase();
    if NAME_TAKEN_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::NameTaken
    } else if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::Authentication
    } else if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::Network
    } else {
        FailureKind::Other
    }
}

/// Decide the outcome of a finished `mkdir`.
pub fn interpret(target: &RemotePath, output: &ToolOutput) -> Result<ProvisionOutcome, ProvisionError> {
    let text = output.combined().to_ascii_lowercase();
    if mentions_owned(&text) {
        return Ok(ProvisionOutcome::AlreadyExists);
    }
    if output.success() {
        return Ok(ProvisionOutcome::Created);
    }
    Err(ProvisionError::Rejected {
        bucket: target.bucket.to_string(),
        kind: classify_failure(&text),
        status: output.status,
        detail: output.tail(),
    })
}

/// Create `target`'s bucket through the sync tool.
pub async fn create_bucket(
    tool: &dyn SyncTool,
    target: &RemotePath,
    cancel: &CancellationToken,
) -> Result<ProvisionOutcome, ProvisionError> {
    let invocation = Invocation::Mkdir {
        target: target.clone(),
    };
    let output = tool.run(&invocation, cancel).await?;
    let outcome = interpret(target, &output)?;
    match outcome {
        ProvisionOutcome::Created => info!("created bucket {target}"),
        ProvisionOutcome::AlreadyExists => warn!("bucket {target} already exists in this account; reusing it"),
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use offsite_core::BucketName;

    use super::*;

    fn target() -> RemotePath {
        RemotePath::new("DESTINATION", BucketName::parse("backup-2024-03-15").unwrap())
    }

    fn output(status: i32, stderr: &str) -> ToolOutput {
        ToolOutput {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.to_owned(),
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn clean_exit_is_created() {
        assert_eq!(interpret(&target(), &output(0, "")).unwrap(), ProvisionOutcome::Created);
    }

    #[test]
    fn owned_bucket_is_already_exists_regardless_of_status() {
        for status in [0, 1] {
            let out = output(
                status,
                "ERROR : Attempt 1/3 failed: BucketAlreadyOwnedByYou: Your previous request to create the named bucket succeeded",
            );
            assert_eq!(
                interpret(&target(), &out).unwrap(),
                ProvisionOutcome::AlreadyExists
            );
        }
    }

    #[test]
    fn name_owned_elsewhere_is_rejected() {
        let out = output(
            1,
            "ERROR : Attempt 3/3 failed: BucketAlreadyExists: The requested bucket name is not available.",
        );
        match interpret(&target(), &out) {
            Err(ProvisionError::Rejected { kind, .. }) => assert_eq!(kind, FailureKind::NameTaken),
            other => panic!("expected NameTaken rejection, got {other:?}"),
        }
    }

    #[test]
    fn failures_are_classified() {
        let cases = [
            ("AccessDenied: Access Denied\n\tstatus code: 403", FailureKind::Authentication),
            ("InvalidAccessKeyId: The AWS Access Key Id you provided does not exist", FailureKind::Authentication),
            ("SignatureDoesNotMatch", FailureKind::Authentication),
            ("dial tcp: lookup s3.dst: no such host", FailureKind::Network),
            ("connect: connection refused", FailureKind::Network),
            ("InvalidBucketName: The specified bucket is not valid.", FailureKind::Other),
        ];
        for (stderr, kind) in cases {
            match interpret(&target(), &output(1, stderr)) {
                Err(ProvisionError::Rejected { kind: got, status, .. }) => {
                    assert_eq!(got, kind, "stderr: {stderr}");
                    assert_eq!(status, Some(1));
                }
                other => panic!("expected Rejected for {stderr:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejection_message_carries_bucket_and_tail() {
        let err = interpret(&target(), &output(7, "boom")).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("backup-2024-03-15"));
        assert!(text.contains("exit status 7"));
        assert!(text.contains("boom"));
    }
}
