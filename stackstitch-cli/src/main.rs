//! Stackstitch CLI - Command-line interface
//!
//! This binary drives a stitching batch from the command line: point it at
//! a scan directory and it writes flattened tiles, stitched rows and final
//! mosaics into the output directory.

use clap::Parser;
use stackstitch::app::{AppError, StitchApp, StitchConfig};
use stackstitch::assembler::BatchReport;
use stackstitch::overlap::{DEFAULT_CONTRAST_GAIN, DEFAULT_MAX_MATCHES};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackstitch")]
#[command(about = "Stitch overlapping scan tiles into composite mosaics", long_about = None)]
struct Args {
    /// Scan directory holding tile directories and acquisition logs
    #[arg(long)]
    indir: PathBuf,

    /// Output directory for flattened tiles, rows and mosaics (created if absent)
    #[arg(long)]
    outdir: PathBuf,

    /// Maximum concurrent raster workers
    #[arg(long, default_value_t = stackstitch::pipeline::DEFAULT_WORKER_LIMIT)]
    workers: usize,

    /// Contrast gain applied to both crops before overlap matching
    #[arg(long, default_value_t = DEFAULT_CONTRAST_GAIN)]
    contrast_gain: f32,

    /// Keep at most this many correspondences per tile pair
    #[arg(long, default_value_t = DEFAULT_MAX_MATCHES)]
    max_matches: usize,

    /// Fail a row instead of accepting a low-confidence overlap estimate
    #[arg(long)]
    reject_low_confidence: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stackstitch={}", default_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_summary(batch: &BatchReport) {
    for mosaic in &batch.mosaics {
        if mosaic.is_complete() {
            let output = mosaic
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!("  {}: ok ({} rows) -> {}", mosaic.prefix, mosaic.rows.len(), output);
        } else {
            let reason = mosaic.failure.as_deref().unwrap_or("unknown failure");
            println!("  {}: FAILED ({})", mosaic.prefix, reason);
        }
    }
    println!("{} stitched, {} failed", batch.completed(), batch.failed());
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.workers == 0 {
        eprintln!("Error: --workers must be at least 1");
        process::exit(1);
    }

    let mut config = StitchConfig::new(&args.indir, &args.outdir);
    config.worker_limit = args.workers;
    config.overlap.contrast_gain = args.contrast_gain;
    config.overlap.max_matches = args.max_matches;
    config.overlap.reject_low_confidence = args.reject_low_confidence;

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            process::exit(1);
        }
    };

    let batch = match runtime.block_on(StitchApp::new(config).run()) {
        Ok(batch) => batch,
        Err(AppError::Metadata(e)) => {
            eprintln!("Error scanning input: {}", e);
            process::exit(1);
        }
        Err(AppError::OutputRoot { path, source }) => {
            eprintln!("Error preparing output directory {}: {}", path.display(), source);
            process::exit(1);
        }
    };

    print_summary(&batch);

    // Nothing stitched at all is a hard failure; partial success is not.
    if !batch.mosaics.is_empty() && batch.completed() == 0 {
        process::exit(2);
    }
}
