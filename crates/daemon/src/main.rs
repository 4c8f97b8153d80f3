// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rollcron - scheduled jobs with rotating snapshots
//!
//! `start` runs the scheduler in the foreground; the other subcommands are
//! one-shot and exit when done.

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rollcron_config::{load_config, Config, DEFAULT_CONFIG_FILE};
use rollcron_core::{is_valid_job_name, JobName};
use rollcron_daemon::commands::{self, OutputFormat};
use rollcron_daemon::lifecycle::{
    acquire_lock, build_runtime, lock_holder_pid, rotate_log_if_needed, setup_cli_logging,
    setup_logging, write_startup_error, write_startup_marker, Daemon, LifecycleError, Paths,
};
use rollcron_daemon::env;
use rollcron_engine::JobSet;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "rollcron",
    version,
    about = "rollcron - scheduled jobs with rotating snapshots"
)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// State directory [default: $ROLLCRON_STATE_DIR, $XDG_STATE_HOME/rollcron
    /// or ~/.local/state/rollcron]
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler in the foreground
    Start,
    /// Validate the config and print each job's next due time
    Check,
    /// Run one job now: execute, snapshot, prune
    Run {
        /// Job name
        job: String,
    },
    /// List a job's recorded generations
    Generations {
        /// Job name
        job: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(&cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: &Cli) -> Result<(), Box<dyn Error>> {
    match &cli.command {
        Commands::Start => start(cli).await,
        Commands::Check => check(cli),
        Commands::Run { job } => run(cli, job).await,
        Commands::Generations { job } => generations(cli, job),
    }
}

fn paths(cli: &Cli) -> Result<Paths, LifecycleError> {
    Ok(Paths::new(env::state_dir(cli.state_dir.as_deref())?))
}

fn exit_already_running(paths: &Paths) -> ! {
    eprintln!("rollcron is already running");
    eprintln!("  state dir: {}", paths.state_dir.display());
    if let Some(pid) = lock_holder_pid(paths) {
        eprintln!("  pid: {pid}");
    }
    std::process::exit(1);
}

async fn start(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let paths = paths(cli)?;
    std::fs::create_dir_all(&paths.state_dir)?;
    rotate_log_if_needed(&paths.log_path);

    // Marker precedes tracing output so the current attempt is easy to find.
    write_startup_marker(&paths)?;
    let log_guard = setup_logging(&paths)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting rollcron daemon");

    let daemon = match Daemon::startup(&cli.config, paths.clone()) {
        Ok(daemon) => daemon,
        Err(LifecycleError::LockFailed(_)) => exit_already_running(&paths),
        Err(e) => {
            write_startup_error(&paths, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    daemon.serve().await?;
    Ok(())
}

fn check(cli: &Cli) -> Result<(), Box<dyn Error>> {
    setup_cli_logging();
    let config = load_config(&cli.config)?;
    let rows = commands::check(&config, chrono::Utc::now());
    match cli.output {
        OutputFormat::Text => {
            print!("{}", commands::format_check(&rows));
            println!(
                "{}: {} job(s) ok",
                cli.config.display(),
                config.jobs.len()
            );
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

async fn run(cli: &Cli, job: &str) -> Result<(), Box<dyn Error>> {
    setup_cli_logging();
    let paths = paths(cli)?;

    // A running daemon owns the registry; refuse rather than race it.
    let _lock = match acquire_lock(&paths) {
        Ok(lock) => lock,
        Err(LifecycleError::LockFailed(_)) => exit_already_running(&paths),
        Err(e) => return Err(e.into()),
    };

    let Config { runner, jobs } = load_config(&cli.config)?;
    let name = JobName::new(job);
    let Some(definition) = jobs.into_iter().find(|j| j.name == name) else {
        return Err(format!("job not found: {job}").into());
    };

    let runtime = build_runtime(&paths, &runner, JobSet::new([definition]))?;
    let report = commands::run_once(&runtime, &name).await?;
    print!("{}", commands::format_run(&report));

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn generations(cli: &Cli, job: &str) -> Result<(), Box<dyn Error>> {
    if !is_valid_job_name(job) {
        return Err(format!("invalid job name: {job}").into());
    }
    let name = JobName::new(job);
    let gens = commands::generations(&paths(cli)?.state_dir, &name)?;
    match cli.output {
        OutputFormat::Text => print!("{}", commands::format_generations(&name, &gens)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&gens)?),
    }
    Ok(())
}
