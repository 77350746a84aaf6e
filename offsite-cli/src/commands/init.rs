//! `offsite init [--force]`

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use offsite_core::{settings, Settings};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing settings file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<ExitCode> {
        let path = settings::save(&Settings::default(), self.force)
            .context("failed to write default settings")?;
        println!("✓ Wrote default settings to {}", path.display());
        println!("  Set secrets.service_url and secrets.secret_id, or pass them as flags.");
        Ok(ExitCode::SUCCESS)
    }
}
