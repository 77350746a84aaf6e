//! `offsite secrets check` — which bundle keys are present. Values are never printed.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use offsite_core::keys;

use super::{GlobalArgs, SecretSourceArgs};

/// Exit code when a required key is missing (the configuration failure code).
const MISSING_KEYS_EXIT: u8 = 11;

#[derive(Subcommand, Debug)]
pub enum SecretsCommand {
    /// Fetch the bundle and report required and optional keys.
    Check {
        #[command(flatten)]
        source: SecretSourceArgs,
    },
}

#[derive(Tabled)]
struct KeyRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "status")]
    status: String,
}

pub fn run(command: SecretsCommand, global: &GlobalArgs) -> Result<ExitCode> {
    match command {
        SecretsCommand::Check { source } => check(&source, global),
    }
}

fn check(source: &SecretSourceArgs, global: &GlobalArgs) -> Result<ExitCode> {
    let settings = global.load_settings()?;
    let provider = source.provider(&settings)?;
    let id = source.secret_id(&settings)?;
    let bundle = provider
        .fetch(&id)
        .with_context(|| format!("failed to fetch secret '{id}' from {}", provider.describe()))?;

    let mut rows = Vec::new();
    for (kind, list) in [("required", keys::REQUIRED), ("optional", keys::OPTIONAL)] {
        for key in list {
            let status = match (bundle.contains(key), kind) {
                (true, _) => "present".green().to_string(),
                (false, "required") => "missing".red().bold().to_string(),
                (false, _) => "absent".bright_black().to_string(),
            };
            rows.push(KeyRow {
                key: (*key).to_owned(),
                kind,
                status,
            });
        }
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let missing = bundle.missing_required();
    if missing.is_empty() {
        println!("{} all {} required keys present", "✓".green(), keys::REQUIRED.len());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} missing: {}", "✗".red(), missing.join(", "));
        Ok(ExitCode::from(MISSING_KEYS_EXIT))
    }
}
