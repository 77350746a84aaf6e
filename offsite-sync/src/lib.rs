//! # offsite-sync
//!
//! Backup orchestration: config writing, sync tool invocation, bucket
//! provisioning, lifecycle policy application and the copy passes.
//!
//! Call [`Pipeline::run`] for a full run or [`Pipeline::plan`] to see what a
//! run would do.

pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod provision;
pub mod tool;
pub mod transfer;
pub mod writer;

pub use error::{
    ConfigurationError, FailureCause, FailureKind, PipelineError, PolicyApplicationError,
    ProvisionError, Stage, ToolError, TransferError,
};
pub use lifecycle::{IamLogin, LifecycleApi, LifecycleTarget, S3LifecycleApi};
pub use pipeline::{Pipeline, RunOptions, RunPlan, RunReport, StageRecord};
pub use provision::ProvisionOutcome;
pub use tool::{CopyMode, Invocation, Rclone, SyncTool, ToolOutput};
pub use transfer::{Pass, PassReport, TransferStats};
pub use writer::WriteResult;
