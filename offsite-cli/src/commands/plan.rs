//! `offsite plan` — resolve a run without side effects.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use offsite_sync::{Pipeline, Rclone, RunOptions, S3LifecycleApi};

use super::{cancel_on_ctrl_c, runtime, GlobalArgs, RunShapeArgs};

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub shape: RunShapeArgs,
}

impl PlanArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let mut settings = global.load_settings()?;
        self.shape.apply(&mut settings);

        let provider = self.shape.source.provider(&settings)?;
        let opts = RunOptions {
            secret_id: self.shape.source.secret_id(&settings)?,
            started_at: self.shape.started_at(),
        };
        let tool = Rclone::from_settings(&settings.sync_tool);
        let lifecycle = S3LifecycleApi::from_settings(&settings.secrets);

        let rt = runtime()?;
        let cancel = cancel_on_ctrl_c(&rt);
        let pipeline = Pipeline::new(&settings, provider, &tool, &lifecycle);
        let plan = rt.block_on(pipeline.plan(&opts, &cancel))?;

        println!("{:<13}{}", "Source:".bold(), plan.source);
        println!("{:<13}{}", "Destination:".bold(), plan.destination);
        println!("{:<13}{}", "Config file:".bold(), plan.config_path.display());
        println!("{:<13}{}", "Lifecycle:".bold(), plan.lifecycle_endpoint);
        println!();
        println!("{}", "Lifecycle policy".bold());
        println!(
            "{}",
            serde_json::to_string_pretty(&plan.policy).context("failed to serialize policy")?
        );
        println!();
        println!("{}", "Commands".bold());
        for invocation in &plan.invocations {
            println!("  {}", tool.command_line(invocation));
        }
        Ok(ExitCode::SUCCESS)
    }
}
