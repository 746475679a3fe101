//! TA pipeline entry point

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use resampler::RestoreJob;
use settings::Settings;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ta_pipeline::{logging, JsonlHistory, Pipeline};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to config/pipeline.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every subscriber and the scheduled sweep until Ctrl-C
    Run,

    /// Resample buckets `(start_score, end_score]` once
    Sweep {
        #[arg(long)]
        start_score: i64,

        /// Defaults to the current sweep ceiling
        #[arg(long)]
        end_score: Option<i64>,
    },

    /// Backfill from a JSON-lines price history, then resample
    Restore {
        #[arg(long)]
        history: PathBuf,

        #[arg(long)]
        from: NaiveDate,

        /// Exclusive; defaults to the earliest stored close, else today
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Replay indicators and detection over the restored range afterwards
        #[arg(long)]
        rescan: bool,
    },

    /// Replay indicators and detection for resampled buckets in `[from, to]`
    Rescan {
        #[arg(long)]
        from: i64,

        #[arg(long)]
        to: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    logging::init(&settings.log)?;

    info!(version = env!("CARGO_PKG_VERSION"), command = ?cli.command, "starting ta-pipeline");
    let pipeline = Pipeline::from_settings(settings)?;

    match cli.command {
        Command::Run => run(&pipeline).await,
        Command::Sweep { start_score, end_score } => sweep(&pipeline, start_score, end_score).await,
        Command::Restore { history, from, to, rescan } => restore(&pipeline, history, from, to, rescan).await,
        Command::Rescan { from, to } => {
            let report = pipeline.rescan(from, to).await?;
            info!(%report, "rescan complete");
            Ok(())
        }
    }
}

async fn run(pipeline: &Pipeline) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = pipeline.spawn(shutdown_rx);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl-C handler")?;
    info!("Shutdown signal received");

    shutdown_tx.send(true).context("Pipeline tasks already gone")?;
    let report = tasks.join().await;
    info!(%report, "pipeline stopped");
    Ok(())
}

/// Stop flag flipped by Ctrl-C for batch commands
fn stop_on_ctrl_c() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current bucket");
            flag.store(true, Ordering::SeqCst);
        }
    });
    stop
}

async fn sweep(pipeline: &Pipeline, start_score: i64, end_score: Option<i64>) -> Result<()> {
    let end_score = end_score
        .unwrap_or_else(|| resampler::end_score_for(Utc::now().timestamp(), pipeline.settings().resampler.lag_buckets));
    if end_score <= start_score {
        bail!("end score {} is not after start score {}", end_score, start_score);
    }

    let partitions = if pipeline.settings().partitions.is_empty() {
        pipeline.resampler().history().partitions().await?
    } else {
        pipeline.settings().partitions.clone()
    };

    let stop = stop_on_ctrl_c();
    let sweep = pipeline
        .resampler()
        .sweep(&partitions, start_score, end_score, &stop)
        .await;
    info!(report = %sweep.report, checkpoint = sweep.checkpoint, "sweep complete");
    Ok(())
}

async fn restore(
    pipeline: &Pipeline,
    history: PathBuf,
    from: NaiveDate,
    to: Option<NaiveDate>,
    rescan: bool,
) -> Result<()> {
    let source = Arc::new(JsonlHistory::open(&history).await?);

    let to = match to {
        Some(to) => to,
        None => earliest_close_date(pipeline).await?.unwrap_or_else(|| Utc::now().date_naive()),
    };

    let job = RestoreJob::new(pipeline.resampler().clone(), source, pipeline.settings().restore.clone());
    let stop = stop_on_ctrl_c();
    let report = job.run(from, to, &stop).await?;
    info!(
        days = report.days,
        failed_days = report.failed_days,
        ticks = %report.ticks,
        buckets = %report.buckets,
        "restore complete"
    );

    if rescan {
        let start = day_start(from);
        let end = day_start(to) - 1;
        let report = pipeline.rescan(start, end).await?;
        info!(%report, "post-restore rescan complete");
    }
    Ok(())
}

fn day_start(day: NaiveDate) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Day of the earliest resampled close across the configured partitions
async fn earliest_close_date(pipeline: &Pipeline) -> Result<Option<NaiveDate>> {
    let mut earliest: Option<i64> = None;
    for partition in &pipeline.settings().partitions {
        if let Some(ts) = pipeline.resampler().earliest_timestamp(partition).await? {
            earliest = Some(earliest.map_or(ts, |e| e.min(ts)));
        }
    }
    Ok(earliest
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive()))
}
