//! # IGC Logger
//!
//! Replay a JSON Lines stream of receiver samples into a signed IGC file.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load and validate the TOML configuration
//!    - Set up logging (console, plus a file when `log_dir` is set)
//!    - Open the sample stream
//!
//! 2. **Main Loop**
//!    - Feed each sample to the flight recorder
//!    - Handle Ctrl+C for graceful shutdown
//!
//! 3. **Shutdown**
//!    - Close the session and re-verify the written file
//!
//! # Examples
//!
//! ```bash
//! igc-logger --config config/default.toml flight.jsonl
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

use igc_logger::config::Config;
use igc_logger::igc::verify::verify;
use igc_logger::logging::init_logging;
use igc_logger::recorder::replay::SampleReader;
use igc_logger::recorder::FlightRecorder;
use igc_logger::storage::{FileCounterStore, FsStorage, SequenceAllocator};

/// Write a signed IGC flight log from recorded samples
#[derive(Debug, Parser)]
#[command(name = "igc-logger", version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// JSON Lines sample file
    samples: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    let _guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("IGC Logger v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut reader = SampleReader::open(&args.samples)
        .await
        .with_context(|| format!("Failed to open samples {}", args.samples.display()))?;

    let allocator = SequenceAllocator::new(
        FileCounterStore::new(&config.logger.root_dir),
        config.logger.counter_key.clone(),
    );
    let mut recorder = FlightRecorder::new(FsStorage::new(), allocator, config.recorder_settings());

    info!("Replaying {}", args.samples.display());
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            sample = reader.next_sample() => {
                match sample? {
                    Some(sample) => {
                        recorder.process(&sample)?;
                    }
                    None => {
                        info!("End of samples after line {}", reader.line_number());
                        break;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let stats = recorder.stats();
    info!(
        "Processed {} samples: {} fixes logged, {} dropped",
        stats.samples, stats.logged, stats.failed
    );

    match recorder.finish() {
        Some(summary) => {
            let contents = tokio::fs::read(&summary.path).await?;
            match verify(&contents) {
                Ok(report) => info!(
                    "{}: {} fixes, G records valid",
                    summary.path.display(),
                    report.fix_count
                ),
                Err(e) => error!("{}: {}", summary.path.display(), e),
            }
        }
        None => warn!("No dated sample seen, no flight log written"),
    }

    info!("IGC Logger stopped");
    Ok(())
}
