//! `offsite run [--json]`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use offsite_core::Settings;
use offsite_sync::{Pipeline, Rclone, RunOptions, RunReport, S3LifecycleApi};

use super::{cancel_on_ctrl_c, runtime, GlobalArgs, RunShapeArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub shape: RunShapeArgs,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct StageRow {
    #[tabled(rename = "")]
    mark: String,
    #[tabled(rename = "stage")]
    stage: String,
    #[tabled(rename = "time")]
    time: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl RunArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let mut settings: Settings = global.load_settings()?;
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
        let report = rt.block_on(pipeline.run(&opts, &cancel))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize run report")?
            );
        } else {
            print_table(&report);
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn print_table(report: &RunReport) {
    let rows: Vec<StageRow> = report
        .stages
        .iter()
        .map(|r| StageRow {
            mark: "✓".green().to_string(),
            stage: r.stage.to_string(),
            time: format!("{:.1}s", r.elapsed_ms as f64 / 1000.0),
            detail: r.detail.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());

    println!(
        "{} {} {} {}",
        "Backed up".bold(),
        report.source,
        "→".bright_black(),
        report.destination.bold()
    );
    println!("{table}");
}
