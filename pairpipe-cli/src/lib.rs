#![warn(missing_docs)]
//! pairpipe CLI Library
//!
//! Command line, configuration layering and logging around the
//! [`Orchestrator`]. Use `pairpipe::run()` (or `pairpipe_cli::run()`) in a
//! main function; the same binary doubles as the worker process through the
//! hidden `--pair-worker` flag.
//!
//! # Example
//!
//! ```ignore
//! fn main() {
//!     if let Err(e) = pairpipe_cli::run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

mod config;
mod launcher;
mod orchestrator;

pub use config::*;
pub use launcher::{
    Launcher, ProcessLauncher, ProcessWorker, ThreadLauncher, ThreadWorker, Worker, WorkerExit,
    WorkerKind,
};
pub use orchestrator::*;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pairpipe_core::{Role, WorkerMain};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// pairpipe CLI arguments
#[derive(Parser, Debug)]
#[command(name = "pairpipe")]
#[command(author, version, about = "pairpipe - producer/consumer pairs over pipes")]
pub struct Cli {
    /// Optional subcommand (Basic, Pairs, Init); defaults to Basic
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (otherwise pairpipe.toml is searched upwards)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run workers as processes or threads (overrides pairpipe.toml)
    #[arg(long, value_enum)]
    pub isolation: Option<IsolationMode>,

    /// What a failed wait does to the run (overrides pairpipe.toml)
    #[arg(long, value_enum)]
    pub wait_failures: Option<WaitPolicy>,

    /// Internal: Run as worker process for this role (used by the orchestrator)
    #[arg(long, hide = true)]
    pub pair_worker: Option<Role>,

    /// Internal: First value a producer worker sends
    #[arg(long, hide = true, default_value = "1", allow_negative_numbers = true)]
    pub start: i32,

    /// Internal: Pair number a worker belongs to
    #[arg(long, hide = true, default_value = "1")]
    pub pair: u32,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single producer/consumer pair (default)
    Basic,
    /// Run several pairs concurrently
    #[command(alias = "multiple-pairs")]
    Pairs {
        /// Number of pairs; zero or fewer runs nothing
        #[arg(allow_negative_numbers = true)]
        count: Option<i64>,
    },
    /// Print a default pairpipe.toml
    Init,
}

/// Run the pairpipe CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if setup, a worker or (under the
/// `fail` wait policy) a wait went wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the pairpipe CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Handle worker mode first (before any other initialization)
    if let Some(role) = cli.pair_worker {
        return run_worker_mode(role, cli.start, cli.pair, cli.verbose);
    }

    let config = match &cli.config {
        Some(path) => PairpipeConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PairpipeConfig::discover().unwrap_or_default(),
    };

    init_logging(cli.verbose, &config.logging.filter);

    let isolation = cli.isolation.unwrap_or(config.runner.isolation);
    let wait_policy = cli.wait_failures.unwrap_or(config.runner.wait_failures);
    let command = cli.command.unwrap_or(Commands::Basic);
    tracing::debug!(?isolation, ?wait_policy, ?command, "resolved run settings");

    match isolation {
        IsolationMode::Process => {
            let launcher = match &config.runner.worker_binary {
                Some(binary) => ProcessLauncher::with_binary(binary),
                None => ProcessLauncher::current_exe()
                    .context("cannot locate the running executable for worker processes")?,
            };
            let launcher = launcher.log_filter(worker_filter(cli.verbose, &config.logging.filter));
            execute(Orchestrator::new(launcher, wait_policy), command, &config)
        }
        IsolationMode::Thread => execute(
            Orchestrator::new(ThreadLauncher::new(), wait_policy),
            command,
            &config,
        ),
    }
}

fn execute<L: Launcher>(
    mut orchestrator: Orchestrator<L>,
    command: Commands,
    config: &PairpipeConfig,
) -> anyhow::Result<()> {
    let summary = match command {
        Commands::Basic => orchestrator.run_basic_demo()?,
        Commands::Pairs { count } => {
            orchestrator.run_multiple_pairs(count.unwrap_or(config.runner.pairs))?
        }
        Commands::Init => {
            print!("{}", PairpipeConfig::default_toml());
            return Ok(());
        }
    };

    if !summary.all_succeeded() {
        tracing::warn!(
            failed = summary.outcomes.iter().filter(|o| !o.succeeded()).count(),
            waited = summary.waited,
            "some workers did not exit cleanly"
        );
    }
    Ok(())
}

/// Run as a worker process (IPC mode)
fn run_worker_mode(role: Role, start: i32, pair: u32, verbose: bool) -> anyhow::Result<()> {
    init_logging(verbose, "pairpipe=info");
    WorkerMain::new(role, start, pair)
        .run()
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("{} worker error: {}", role, e))
}

fn worker_filter(verbose: bool, configured: &str) -> String {
    if verbose {
        "pairpipe=debug".to_string()
    } else {
        configured.to_string()
    }
}

/// Install the stderr `tracing` subscriber. `RUST_LOG` wins over `--verbose`,
/// which wins over the configured filter.
fn init_logging(verbose: bool, configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(worker_filter(verbose, configured)));

    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}
