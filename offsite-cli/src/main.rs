//! offsite — off-site object-storage backup runner.
//!
//! # Usage
//!
//! ```text
//! offsite run [--json] [--secret-id <id>] [--secrets-file <path>] [--at <rfc3339>]
//! offsite plan [--secret-id <id>] [--secrets-file <path>] [--at <rfc3339>]
//! offsite bucket-name [--at <rfc3339>]
//! offsite secrets check [--secret-id <id>] [--secrets-file <path>]
//! offsite init [--force]
//! ```
//!
//! Global flags: `--settings <path>`, `-v/--verbose`.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use commands::{
    bucket_name::BucketNameArgs, init::InitArgs, plan::PlanArgs, run::RunArgs,
    secrets::SecretsCommand, GlobalArgs,
};
use offsite_sync::PipelineError;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "offsite",
    version,
    about = "Copy a source bucket into a dated, lifecycle-managed backup bucket",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full backup: secrets, config, bucket, lifecycle, verify, dry run, copy.
    Run(RunArgs),

    /// Show what a run would do without touching any bucket.
    Plan(PlanArgs),

    /// Print the destination bucket name for an instant.
    BucketName(BucketNameArgs),

    /// Inspect the secret bundle.
    Secrets {
        #[command(subcommand)]
        command: SecretsCommand,
    },

    /// Write the default settings file to ~/.offsite/config.yaml.
    Init(InitArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let global = cli.global;
    let result = match cli.command {
        Commands::Run(args) => args.run(&global),
        Commands::Plan(args) => args.run(&global),
        Commands::BucketName(args) => args.run(&global),
        Commands::Secrets { command } => commands::secrets::run(command, &global),
        Commands::Init(args) => args.run(),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            // A pipeline error already spells out its whole cause chain.
            let (code, message) = match err.downcast_ref::<PipelineError>() {
                Some(failure) => (failure.exit_code(), failure.to_string()),
                None => (1, format!("{err:#}")),
            };
            eprintln!("{} {message}", "error:".red().bold());
            ExitCode::from(code)
        }
    }
}
