use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

mod commands;
mod config;
mod dispatch;
mod exit_codes;
mod interrupt;
mod output;
mod preconditions;
mod registry;
mod report;
mod settings;
mod shim;
use commands::Privileges;
use config::Config;
use dispatch::{Action, Confirm, Decline, RunContext, TerminalConfirm};
use output::{HelpResponse, JsonError, Output, VersionResponse};
use preconditions::PreconditionError;
use registry::{IndexError, Registry};
use shim::SystemRunner;

/// Version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether the selected command supports JSON output mode.
fn json_supported(command: Option<&Commands>) -> bool {
    match command {
        None => true,
        Some(Commands::List | Commands::Audit { .. } | Commands::Help) => true,
        Some(Commands::Fix { .. } | Commands::FixForce { .. }) => false,
    }
}

#[derive(Parser)]
#[command(name = "lockdown")]
#[command(version = VERSION)]
#[command(about = "Audit and fix macOS security settings", long_about = None)]
#[command(
    after_help = "Run `lockdown list` to see setting indices, then `lockdown audit <index>` to check one."
)]
#[command(disable_help_subcommand = true)]
struct Cli {
    /// Path to config file (default: ./lockdown.toml)
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,

    /// Minimal output (results only)
    #[arg(long, global = true)]
    quiet: bool,

    /// Show each command lockdown runs
    #[arg(long, global = true)]
    verbose: bool,

    /// Output as JSON instead of human-readable text (list, audit)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every setting with its index
    List,
    /// Check settings without changing anything
    Audit {
        /// Setting index from `lockdown list` (default: all settings)
        #[arg(allow_negative_numbers = true)]
        index: Option<String>,
    },
    /// Audit, then fix failing settings after confirmation
    Fix {
        /// Setting index from `lockdown list` (default: all settings)
        #[arg(allow_negative_numbers = true)]
        index: Option<String>,
    },
    /// Audit, then fix failing settings without asking
    #[command(name = "fix-force")]
    FixForce {
        /// Setting index from `lockdown list` (default: all settings)
        #[arg(allow_negative_numbers = true)]
        index: Option<String>,
    },
    /// Show usage
    #[command(visible_alias = "usage")]
    Help,
}

impl Commands {
    fn action(self, registry: &Registry) -> Result<Action, IndexError> {
        match self {
            Commands::List => Ok(Action::List),
            Commands::Audit { index } => Action::audit(registry, index.as_deref()),
            Commands::Fix { index } => Action::fix(registry, index.as_deref(), false),
            Commands::FixForce { index } => Action::fix(registry, index.as_deref(), true),
            Commands::Help => unreachable!("help exits before configuration loads"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present so LOCKDOWN_* variables can live there
    let _ = dotenvy::dotenv();

    // Check for --json flag early (before full parsing) for error handling
    let json_mode = std::env::args().any(|arg| arg == "--json");

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp if json_mode => {
                HelpResponse::new(e.to_string()).print();
                std::process::exit(exit_codes::PASSED);
            }
            ErrorKind::DisplayVersion if json_mode => {
                VersionResponse::new(VERSION.to_string()).print();
                std::process::exit(exit_codes::PASSED);
            }
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ if json_mode => {
                JsonError::with_code("usage_error", e.to_string()).print();
                std::process::exit(exit_codes::USAGE_ERROR);
            }
            _ => {
                // Clap's own usage errors exit 2; lockdown reports them as 1
                let _ = e.print();
                std::process::exit(exit_codes::USAGE_ERROR);
            }
        },
    };

    let output = Output::new(cli.json, cli.quiet, cli.verbose);

    // Gate unsupported commands in JSON mode
    if cli.json && !json_supported(cli.command.as_ref()) {
        JsonError::new("--json is only supported for list and audit").print();
        std::process::exit(exit_codes::OPERATIONAL_FAILURE);
    }

    let code = match run(cli, &output).await {
        Ok(code) => code,
        Err(e) => {
            let (code, reason) = classify_error(&e);
            if json_mode {
                JsonError::with_code(reason, e.to_string())
                    .with_details(format!("{e:#}"))
                    .print();
            } else if code == exit_codes::INTERRUPTED {
                eprintln!("Interrupted");
            } else {
                eprintln!("Error: {e:#}");
            }
            code
        }
    };

    output.flush();
    std::process::exit(code);
}

/// Exit code and JSON error code for a fatal error.
fn classify_error(e: &anyhow::Error) -> (i32, &'static str) {
    if interrupt::is_interrupted(e) {
        (exit_codes::INTERRUPTED, "interrupted")
    } else if e.downcast_ref::<IndexError>().is_some() {
        (exit_codes::USAGE_ERROR, "invalid_index")
    } else if e.downcast_ref::<PreconditionError>().is_some() {
        (exit_codes::ENVIRONMENT_ERROR, "precondition_failed")
    } else {
        (exit_codes::OPERATIONAL_FAILURE, "internal_error")
    }
}

fn print_usage(output: &Output) -> Result<()> {
    let mut cmd = Cli::command();
    if output.is_json() {
        HelpResponse::new(cmd.render_help().to_string()).print();
    } else {
        cmd.print_help().context("Failed to print usage")?;
        println!();
    }
    Ok(())
}

async fn run(cli: Cli, output: &Output) -> Result<i32> {
    let command = match cli.command {
        None | Some(Commands::Help) => {
            print_usage(output)?;
            return Ok(exit_codes::PASSED);
        }
        Some(command) => command,
    };

    let config =
        Config::load(cli.config_path.as_deref()).context("Failed to load configuration")?;
    let registry = Registry::builtin()?;
    config.validate(&registry)?;

    // Bad indices are rejected before anything touches the host
    let action = command.action(&registry)?;

    let cancel = CancellationToken::new();
    let runner = SystemRunner::new(config.sudo_path(), cancel.clone(), output.clone());
    let host = preconditions::check(&runner, &config, output).await?;
    let runner = runner.with_root(host.is_root);

    let ctx = RunContext {
        registry: &registry,
        runner: &runner,
        host: &host,
        cancel,
        skip: config.skipped_settings(),
    };
    let privileges = Privileges {
        sudo: config.sudo_path(),
        is_root: host.is_root,
    };

    match action {
        Action::List => commands::list(&registry, output),
        Action::Audit(selection) => commands::audit(&ctx, selection, &privileges, output).await,
        Action::Fix { selection, force } => {
            let confirm: Box<dyn Confirm> = if dispatch::prompts_allowed() {
                Box::new(TerminalConfirm)
            } else {
                Box::new(Decline)
            };
            commands::fix(&ctx, selection, force, confirm.as_ref(), &privileges, output).await
        }
    }
}
