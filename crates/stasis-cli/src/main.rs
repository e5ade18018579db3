//! stasis CLI - back up, restore, and switch application installations
//!
//! Provides `stasis backup`, `stasis restore`, `stasis snapshot`, and the
//! rest. The legacy `/BACKUP`-style switches are still accepted.

mod commands;

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "stasis")]
#[command(about = "stasis - manage multiple installations of one application")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $STASIS_CONFIG, then the per-user stasis.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a backup, optionally under a new name
    Backup {
        /// `ARCHIVE` or `NAME ARCHIVE`
        #[arg(value_name = "NAME_OR_ARCHIVE", num_args = 0..=2)]
        args: Vec<String>,
    },
    /// Install the archived version whose file name contains FRAGMENT
    Restore {
        /// Part of the archive file name, matched ignoring case
        fragment: String,
    },
    /// Uninstall the existing installation
    Uninstall,
    /// Create a new snapshot of the existing installation
    Snapshot,
    /// Revert to the last snapshot (or snapshot N)
    Revert {
        /// Snapshot index
        #[arg(default_value_t = 0)]
        index: u32,
    },
    /// List the archives in the base directory
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Rewrite `/BACKUP`, `/restore`, `/?` and friends into subcommand syntax
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    const SWITCHES: &[&str] = &["backup", "restore", "uninstall", "snapshot", "revert"];

    args.into_iter()
        .enumerate()
        .map(|(position, arg)| {
            if position == 0 {
                return arg;
            }
            let Some(switch) = arg.to_str().and_then(|s| s.strip_prefix('/')) else {
                return arg;
            };
            if switch == "?" || switch.eq_ignore_ascii_case("help") {
                return OsString::from("--help");
            }
            SWITCHES
                .iter()
                .find(|name| switch.eq_ignore_ascii_case(name))
                .map_or(arg.clone(), OsString::from)
        })
        .collect()
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("STASIS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let context = commands::Context::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Backup { args }) => commands::backup::run(&context, &args),
        Some(Commands::Restore { fragment }) => commands::restore::run(&context, &fragment),
        Some(Commands::Uninstall) => commands::uninstall::run(&context),
        Some(Commands::Snapshot) => commands::backup::snapshot(&context),
        Some(Commands::Revert { index }) => commands::restore::revert(&context, index),
        Some(Commands::List { json }) => commands::list::run(&context, json),
        None => commands::list::run(&context, false),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
