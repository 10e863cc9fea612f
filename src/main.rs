use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use fota::cli::{Cli, ProgressMode};
use fota::config::{FileConfig, Settings};
use fota::delivery::{
    run_session, BarProgress, ConsoleProgress, NoProgress, Progress, SessionReport,
};
use fota::{transport, FotaError, SessionError};

#[derive(Debug, Serialize)]
struct Summary {
    bytes_sent: u64,
    chunks_sent: u64,
    banner: String,
    elapsed_ms: u64,
}

impl From<&SessionReport> for Summary {
    fn from(report: &SessionReport) -> Self {
        Self {
            bytes_sent: report.bytes_sent,
            chunks_sent: report.chunks_sent,
            banner: report.banner.escape_ascii().to_string(),
            elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cancelled = err
                .downcast_ref::<SessionError>()
                .is_some_and(|e| e.error.is_cancelled());
            eprintln!("{} {:#}", "error:".red().bold(), err);
            if cancelled {
                ExitCode::from(130)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let file_config = FileConfig::discover(cli.config.as_deref())?;
    let settings = Settings::resolve(cli, &file_config)?;

    let source = tokio::fs::File::open(&settings.source)
        .await
        .map_err(FotaError::SourceRead)
        .with_context(|| format!("opening {}", settings.source.display()))?;
    let source_len = source
        .metadata()
        .await
        .map_err(FotaError::SourceRead)
        .with_context(|| format!("reading metadata of {}", settings.source.display()))?
        .len();

    let conn = transport::connect(&settings.address, settings.connect_timeout)
        .await
        .with_context(|| format!("connecting to {}", settings.address))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, aborting session");
            on_signal.cancel();
        }
    });

    let mode = cli.progress_mode();
    let mut progress: Box<dyn Progress> = match mode {
        ProgressMode::Dots => Box::new(ConsoleProgress::stdout()),
        ProgressMode::Bar => Box::new(BarProgress::new(source_len)),
        ProgressMode::None => Box::new(NoProgress),
    };

    let report = run_session(
        source,
        settings.queue.clone(),
        conn,
        &settings.session,
        progress.as_mut(),
        &cancel,
    )
    .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&Summary::from(&report))?);
    } else if !cli.quiet && mode != ProgressMode::Dots {
        println!(
            "{} total: {}",
            "Done,".green().bold(),
            report.bytes_sent
        );
    }

    Ok(())
}
