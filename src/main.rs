//! CLI entry point for the GTFS-RT ingest tool.
//!
//! Provides subcommands for inspecting a captured feed, extracting trip update
//! and vehicle position records from one capture, and extracting a whole set
//! of configured captures concurrently.

use anyhow::Result;
use clap::{Parser, Subcommand};
use gtfs_rt_ingest::{
    config::SourceConfig,
    ingest::{FeedRecords, ingest},
    output::{
        OutputFormat, TRIP_UPDATE_EVENTS_TABLE, VEHICLE_POSITIONS_TABLE, print_json, print_pretty,
    },
    payload::{FeedType, RawFeedPayload},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::Instrument;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_ingest")]
#[command(about = "Extract flat records from GTFS-RT feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a captured feed and log what extraction would keep
    Inspect {
        /// Path to a .pb or .pb.gz capture
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Extract records from one captured feed and append them to disk
    Extract {
        /// Path to a .pb or .pb.gz capture
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Source identifier recorded with the feed
        #[arg(short, long, default_value = "local")]
        source: String,

        /// Endpoint the capture came from
        #[arg(short = 't', long, value_enum, default_value_t = FeedType::TripUpdates)]
        feed_type: FeedType,

        /// Directory to append trip_update_events and vehicle_positions files to
        #[arg(short, long, default_value = "records")]
        output_dir: PathBuf,

        /// csv, or json for one object per line (.jsonl)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
    /// Extract every capture listed in a source config
    ExtractAll {
        /// JSON file mapping source ids to captures
        #[arg(short, long, default_value = "sources.json")]
        config: String,

        /// Directory to write one source=<id> subdirectory per source
        #[arg(short, long, default_value = "records")]
        output_dir: PathBuf,

        /// Maximum number of captures processed at once
        #[arg(short = 'n', long, default_value_t = 4)]
        concurrency: usize,

        /// csv, or json for one object per line (.jsonl)
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { file } => {
            let payload = RawFeedPayload::from_file("local", FeedType::TripUpdates, &file)?;
            match ingest(&payload) {
                Some(records) => {
                    print_pretty(&records.stats);
                    print_json(&records.stats)?;
                }
                None => warn!(file = %file.display(), "Not a GTFS-RT feed"),
            }
        }
        Commands::Extract {
            file,
            source,
            feed_type,
            output_dir,
            format,
        } => {
            let payload = RawFeedPayload::from_file(source, feed_type, &file)?;
            if let Some(records) = ingest(&payload) {
                write_records(&output_dir, &records, format)?;
            }
        }
        Commands::ExtractAll {
            config,
            output_dir,
            concurrency,
            format,
        } => {
            extract_all(&config, &output_dir, concurrency, format).await?;
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_rt_ingest.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_ingest.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(file_guard)
}

/// Appends both record sets to their table files under `output_dir`.
fn write_records(output_dir: &Path, records: &FeedRecords, format: OutputFormat) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;

    let trip_rows = format.append(
        format.table_path(output_dir, TRIP_UPDATE_EVENTS_TABLE),
        &records.trip_updates,
    )?;
    let vehicle_rows = format.append(
        format.table_path(output_dir, VEHICLE_POSITIONS_TABLE),
        &records.vehicle_positions,
    )?;

    info!(
        output_dir = %output_dir.display(),
        format = format.extension(),
        trip_rows,
        vehicle_rows,
        "Records written"
    );
    Ok(())
}

/// Ingests every configured capture, at most `concurrency` at a time.
///
/// Each source writes to its own `source=<id>` directory so concurrent tasks
/// never append to the same file.
#[tracing::instrument(skip(output_dir), fields(output_dir = %output_dir.display()))]
async fn extract_all(
    config: &str,
    output_dir: &Path,
    concurrency: usize,
    format: OutputFormat,
) -> Result<()> {
    let sources = SourceConfig::load(config)?;
    info!(source_count = sources.len(), "Sources loaded");

    let semaphore = std::sync::Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut tasks = vec![];

    for (source, entry) in sources.iter() {
        let sem = semaphore.clone();
        let source = source.to_string();
        let entry = entry.clone();
        let source_dir = output_dir.join(format!("source={source}"));

        let source_span = tracing::info_span!(
            "process_source",
            source = %source,
            feed_type = %entry.feed_type,
        );

        let task = tokio::spawn(
            async move {
                let Ok(_permit) = sem.acquire().await else {
                    return;
                };

                let span = tracing::Span::current();
                let result = tokio::task::spawn_blocking(move || -> Result<bool> {
                    let _entered = span.enter();
                    let payload = RawFeedPayload::from_file(source, entry.feed_type, &entry.path)?;
                    match ingest(&payload) {
                        Some(records) => {
                            write_records(&source_dir, &records, format)?;
                            Ok(true)
                        }
                        None => Ok(false),
                    }
                })
                .await;

                match result {
                    Ok(Ok(true)) => info!("Source processed successfully"),
                    Ok(Ok(false)) => warn!("Source skipped, feed did not decode"),
                    Ok(Err(e)) => error!(error = %e, "Source processing failed"),
                    Err(e) => error!(error = %e, "Source task panicked"),
                }
            }
            .instrument(source_span),
        );

        tasks.push(task);
    }

    // Wait for all tasks to complete
    for task in tasks {
        let _ = task.await;
    }

    info!("Finished processing all sources");
    Ok(())
}
