//! `wallbatch`: submits like, share and subscribe batches to the worker
//! service and follows them to completion.
//!
//! ```text
//! wallbatch like      [--count N] [--input FILE|-] [TEXT...]
//! wallbatch share     [--input FILE|-] [TEXT...]
//! wallbatch subscribe [--input FILE|-] [TEXT...]
//! wallbatch check     [--kind post|community] [--input FILE|-] [TEXT...]
//! ```

mod config;
mod input;
mod logging;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use engine_logging::{engine_error, engine_info, engine_warn};
use wallbatch_core::{
    extract_targets_for, BatchParams, JobOutcome, TargetKind, TOKEN_COUNT_DEFAULT,
};
use wallbatch_engine::{BatchEvent, EngineHandle};

use crate::config::{AppConfig, API_URL_ENV};
use crate::input::SourceArgs;
use crate::logging::LogDestination;

const EVENT_WAIT: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(
    name = "wallbatch",
    about = "Batch like, share and subscribe jobs against the wall worker service",
    long_about = "
Submits a batch of wall post or community links to the worker service,
follows asynchronous jobs until they finish and prints a summary.

ENVIRONMENT VARIABLES:
  WALLBATCH_API_URL    Service base URL (overrides the config file)
",
    version
)]
struct Cli {
    /// RON config file (default: ./wallbatch.ron when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Service base URL, overriding config and environment
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Where log output goes
    #[arg(long, global = true, value_enum, default_value_t = LogDestination::File)]
    log: LogDestination,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Like wall posts from a pool of accounts
    Like {
        /// Accounts per post (1-100, default 10 or the config value)
        #[arg(short, long)]
        count: Option<u32>,
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Share wall posts as private messages
    Share {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Subscribe accounts to one community
    Subscribe {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show which links would be submitted, without contacting the service
    Check {
        #[arg(long, value_enum, default_value_t = KindArg::Post)]
        kind: KindArg,
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    /// Wall post links (like, share)
    Post,
    /// Community links (subscribe)
    Community,
}

impl From<KindArg> for TargetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Post => TargetKind::WallPost,
            KindArg::Community => TargetKind::Community,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::initialize(cli.log, cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            engine_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::locate(cli.config.as_deref(), &config::current_dir())?;

    let (params, source) = match cli.command {
        Commands::Check { kind, source } => {
            let raw = source.read_raw()?;
            let targets = extract_targets_for(kind.into(), &raw);
            print!("{}", report::render_check(&targets));
            return Ok(if targets.is_empty() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            });
        }
        Commands::Like { count, source } => (
            BatchParams::like(
                count
                    .or(config.token_count)
                    .unwrap_or(TOKEN_COUNT_DEFAULT),
            ),
            source,
        ),
        Commands::Share { source } => (BatchParams::share(), source),
        Commands::Subscribe { source } => (BatchParams::subscribe(), source),
    };

    let raw = source.read_raw()?;
    let settings = config.engine_settings(std::env::var(API_URL_ENV).ok(), cli.api_url.as_deref());
    let engine = EngineHandle::new(&settings).context("failed to start the batch engine")?;
    engine_info!("{} run against {}", params.operation.label(), settings.base_url);

    engine
        .run_batch(&raw, params)
        .context("failed to start the batch")?;

    match follow(&engine) {
        Some(outcome) => {
            print!("{}", report::render_outcome(params.operation, &outcome));
            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        None => {
            engine_warn!("{} run ended without an outcome", params.operation.label());
            eprintln!("{} batch ended without a result", params.operation.label());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Prints events until the run's outcome arrives. Returns `None` when the
/// run ended without one, as after a cancellation.
fn follow(engine: &EngineHandle) -> Option<JobOutcome> {
    loop {
        let event = match engine.recv_timeout(EVENT_WAIT) {
            Some(event) => event,
            None if engine.orchestrator().is_busy() => continue,
            // The outcome is sent right after the slot is released.
            None => engine.recv_timeout(EVENT_WAIT)?,
        };
        match event {
            BatchEvent::Progress(snapshot) => {
                println!("{}", report::render_progress(&snapshot));
            }
            BatchEvent::Finished(outcome) => return Some(outcome),
        }
    }
}
