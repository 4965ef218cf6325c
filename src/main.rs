//! CLI entry point for booru-crawler.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::Result;
use booru_crawler::{Crawler, Started};
use tracing::{debug, error, info, warn};

mod app_config;
mod cli;
mod progress;

use app_config::{
    apply_config_defaults, crawl_config_from_args, load_file_config, parse_cli_with_sources,
};
use progress::ProgressReporter;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    Failure,
    /// `--keep-going` run in which some items failed.
    Partial,
    Interrupted,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
            Self::Interrupted => 130,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (args, cli_sources) = parse_cli_with_sources();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(args, cli_sources).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            error!("{e:#}");
            ProcessExit::Failure.into()
        }
    }
}

async fn run(args: cli::Args, cli_sources: app_config::CliValueSources) -> Result<ProcessExit> {
    let file_config = load_file_config(args.config.as_deref())?;
    let args = apply_config_defaults(args, &cli_sources, file_config.as_ref());
    let config = crawl_config_from_args(&args)?;

    info!(query = %config.query, destination = %config.destination.display(), "booru-crawler starting");
    let started_at = Instant::now();
    let crawler = Crawler::new(config)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let signal = {
        let cancel = crawler.cancellation_token();
        let interrupted = Arc::clone(&interrupted);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing in-flight downloads");
                interrupted.store(true, Ordering::SeqCst);
                cancel.cancel();
            }
        })
    };

    let run = match crawler.start().await {
        Ok(Started::Running(run)) => run,
        Ok(Started::NoResults) => {
            signal.abort();
            println!("No images.");
            return Ok(ProcessExit::Success);
        }
        Err(e) => {
            signal.abort();
            return Err(e.into());
        }
    };

    let progress = ProgressReporter::new(run.total(), args.quiet);
    let result = run.drive(|completion| progress.record(completion)).await;
    progress.finish();
    signal.abort();

    if !args.quiet {
        println!("Finished in {:.2?}", started_at.elapsed());
    }

    if interrupted.load(Ordering::SeqCst) {
        return Ok(ProcessExit::Interrupted);
    }
    let summary = result?;
    info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        completed = progress.position(),
        total = summary.total,
        "Download complete"
    );

    if summary.failed > 0 {
        Ok(ProcessExit::Partial)
    } else {
        Ok(ProcessExit::Success)
    }
}
