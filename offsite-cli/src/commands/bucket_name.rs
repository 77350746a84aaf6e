//! `offsite bucket-name [--at <rfc3339>]`

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use super::{parse_instant, GlobalArgs};

#[derive(Args, Debug)]
pub struct BucketNameArgs {
    /// Instant to name; defaults to now.
    #[arg(long, value_parser = parse_instant)]
    pub at: Option<DateTime<Utc>>,
}

impl BucketNameArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let settings = global.load_settings()?;
        let instant = self.at.unwrap_or_else(Utc::now);
        let name = settings
            .naming
            .namer()?
            .name_at(instant)
            .with_context(|| format!("cannot name a bucket for {}", instant.to_rfc3339()))?;
        println!("{name}");
        Ok(ExitCode::SUCCESS)
    }
}
