//! CLI entry point for the METAR watch tool.
//!
//! Provides subcommands for decoding reports for specific stations, running
//! nationwide sweeps, watching continuously with outage-ledger updates, and
//! printing the downtime leaderboard.

mod infra;

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::infra::awc::AwcClient;
use metar_watch::{
    collector::{fetch_stations, sweep_states},
    decoder::decode_wx_string,
    ledger::{OutageLedger, S3LedgerStore, StatusSample},
    output::{append_record, print_json},
    stats::CycleStats,
};

#[derive(Parser)]
#[command(name = "metar_watch")]
#[command(about = "A tool to monitor METAR reports and track station maintenance outages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and decode the current reports for specific stations
    Fetch {
        /// 4-character station ids (e.g. KORD KMDW)
        #[arg(value_name = "STATION", required = true)]
        ids: Vec<String>,
    },
    /// Run one nationwide sweep and append cycle statistics to a CSV file
    Sweep {
        /// CSV file to append cycle statistics to
        #[arg(short, long, default_value = "cycles.csv")]
        output: String,
    },
    /// Sweep all states periodically and keep the outage ledger updated
    Watch {
        /// CSV file to append cycle statistics to
        #[arg(short, long, default_value = "cycles.csv")]
        output: String,

        /// Sample rate: run a sweep every X seconds
        #[arg(short = 'r', long, default_value_t = 3600)]
        sample_rate: u64,

        /// Number of sweeps to run (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_samples: usize,

        /// Optional: S3 bucket holding the outage ledger (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Object key for the ledger blob
        #[arg(long, default_value = "ledger/outages.json")]
        ledger_key: String,

        /// Optional: Gzip compress the ledger blob in S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Print the station downtime leaderboard from the persisted ledger
    Stats {
        /// S3 bucket holding the outage ledger
        #[arg(long)]
        s3_bucket: String,

        /// Object key for the ledger blob
        #[arg(long, default_value = "ledger/outages.json")]
        ledger_key: String,
    },
    /// Delete the persisted outage ledger
    Reset {
        /// S3 bucket holding the outage ledger
        #[arg(long)]
        s3_bucket: String,

        /// Object key for the ledger blob
        #[arg(long, default_value = "ledger/outages.json")]
        ledger_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/metar_watch.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("metar_watch.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch { ids } => {
            let client = AwcClient::new()?;
            let observations = fetch_stations(&client, &ids).await?;

            for obs in &observations {
                info!(
                    station = %obs.station_id,
                    zulu = %obs.observation_zulu,
                    category = %obs.flight_category,
                    temp_f = ?obs.temperature_f(),
                    wx = %decode_wx_string(&obs.weather_phenomena.join(" ")),
                    flagged = obs.has_maintenance_flag,
                    "Station"
                );
            }

            println!("{}", serde_json::to_string_pretty(&observations)?);
        }
        Commands::Sweep { output } => {
            let api = Arc::new(AwcClient::new()?);
            let sweep = sweep_states(api).await;

            let stats = CycleStats::from_observations(&sweep.observations)
                .with_partition_failures(sweep.partitions_failed);
            print_json(&stats)?;
            append_record(&output, &stats)?;
        }
        Commands::Watch {
            output,
            sample_rate,
            num_samples,
            s3_bucket,
            ledger_key,
            gzip,
        } => {
            watch(&output, sample_rate, num_samples, s3_bucket, ledger_key, gzip).await?;
        }
        Commands::Stats {
            s3_bucket,
            ledger_key,
        } => {
            let ledger = OutageLedger::new(s3_store(&s3_bucket, &ledger_key, false).await);
            let leaderboard = ledger.stats(Utc::now().timestamp_millis()).await;

            info!(stations = leaderboard.len(), "Leaderboard computed");
            println!("{}", serde_json::to_string_pretty(&leaderboard)?);
        }
        Commands::Reset {
            s3_bucket,
            ledger_key,
        } => {
            let ledger = OutageLedger::new(s3_store(&s3_bucket, &ledger_key, false).await);
            ledger.reset().await?;
            info!(bucket = %s3_bucket, key = %ledger_key, "Outage ledger deleted");
        }
    }

    Ok(())
}

/// Builds an S3-backed ledger store from the ambient AWS configuration.
async fn s3_store(bucket: &str, key: &str, gzip: bool) -> S3LedgerStore {
    let config = aws_config::load_from_env().await;
    let client = aws_sdk_s3::Client::new(&config);

    let store = S3LedgerStore::new(client, bucket, key);
    if gzip { store.with_gzip() } else { store }
}

/// Sweeps all states at a configurable interval, appending one cycle-stats
/// row per sweep and feeding each sweep's flag samples into the outage
/// ledger when a bucket is configured.
#[tracing::instrument(skip(s3_bucket, ledger_key, gzip), fields(output, sample_rate, num_samples))]
async fn watch(
    output: &str,
    sample_rate: u64,
    num_samples: usize,
    s3_bucket: Option<String>,
    ledger_key: String,
    gzip: bool,
) -> Result<()> {
    let api = Arc::new(AwcClient::new()?);

    let ledger: Option<OutageLedger<S3LedgerStore>> = match &s3_bucket {
        Some(bucket) => {
            info!(bucket = %bucket, key = %ledger_key, gzip, "Outage ledger persistence enabled");
            Some(OutageLedger::new(s3_store(bucket, &ledger_key, gzip).await))
        }
        None => None,
    };

    if num_samples == 0 {
        info!(sample_rate, "Sweeping infinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_samples, sample_rate, "Starting sweep collection");
    }

    let mut sample_count = 0;

    loop {
        // Check if we've reached the sample limit (0 = infinite)
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }

        sample_count += 1;

        info!(
            sample = sample_count,
            total = if num_samples == 0 {
                None
            } else {
                Some(num_samples)
            },
            "Starting sweep"
        );

        let sweep = sweep_states(Arc::clone(&api)).await;
        let stats = CycleStats::from_observations(&sweep.observations)
            .with_partition_failures(sweep.partitions_failed);

        info!(
            stations = stats.stations,
            flagged = stats.maintenance_flagged,
            partitions_failed = stats.partitions_failed,
            "Sweep complete"
        );

        if let Err(e) = append_record(output, &stats) {
            error!(error = %e, "Failed to write cycle stats");
        }

        if let Some(ledger) = &ledger {
            let samples: Vec<StatusSample> =
                sweep.observations.iter().map(StatusSample::from).collect();
            let now_ms = Utc::now().timestamp_millis();

            match ledger.record_batch(&samples, now_ms).await {
                Ok(updated) => {
                    info!(
                        events = updated.events.len(),
                        tracked_stations = updated.statuses.len(),
                        "Outage ledger updated"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Outage ledger update failed");
                    let error_stats =
                        CycleStats::from_error("ledger_write_error", &e.to_string());
                    let _ = append_record(output, &error_stats);
                }
            }
        }

        // If not the last sample, wait before next iteration
        if num_samples == 0 || sample_count < num_samples {
            info!(sample_rate, "Waiting before next sweep");
            tokio::time::sleep(tokio::time::Duration::from_secs(sample_rate)).await;
        }
    }

    info!(output, "Finished sweeping");
    Ok(())
}
