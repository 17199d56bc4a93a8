mod capture;
mod config;
mod daylight;
mod executor;
mod fs_utils;
mod images;
mod pass;
mod pipeline;
mod publish;
mod receiver;
mod store;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use crate::config::Config;
use crate::executor::Executor;
use crate::images::canonical::{canonical_kind, CanonicalRule};
use crate::pass::{PassCapture, PassDirection, PassSide};
use crate::pipeline::{PassPipeline, PipelineOutcome};
use crate::receiver::ReceiveMode;

#[derive(Parser)]
#[command(name = "pass-o-mat")]
#[command(about = "Weather satellite pass capture and publishing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture, process, record and publish one pass
    Run {
        #[arg(long)]
        config: PathBuf,
        #[command(flatten)]
        pass: PassArgs,
    },
    /// Validate a station configuration file
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the canonical image kind of a raw decoder file name
    Canonicalize {
        #[arg(long)]
        mode: String,
        name: String,
    },
}

#[derive(clap::Args)]
struct PassArgs {
    #[arg(long)]
    satellite: String,
    #[arg(long)]
    filename_base: String,
    #[arg(long)]
    tle: PathBuf,
    /// AOS as Unix seconds
    #[arg(long)]
    start: i64,
    /// Capture duration in seconds
    #[arg(long)]
    duration: u64,
    #[arg(long)]
    max_elevation: f64,
    #[arg(long)]
    direction: PassDirection,
    #[arg(long)]
    side: PassSide,
}

impl From<PassArgs> for PassCapture {
    fn from(args: PassArgs) -> Self {
        Self {
            satellite: args.satellite,
            filename_base: args.filename_base,
            tle_file: args.tle,
            epoch_start: args.start,
            duration_seconds: args.duration,
            max_elevation_deg: args.max_elevation,
            direction: args.direction,
            side: args.side,
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, pass } => run(&config, pass.into()),
        Commands::Validate { config } => validate(&config),
        Commands::Canonicalize { mode, name } => canonicalize(&mode, &name),
    }
}

fn validate(path: &Path) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let profile = match config.receiver_profile() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    println!(
        "Config is valid: {} at {} S/s via {}",
        profile.receiver_type,
        profile.sample_rate_arg(),
        profile.backend
    );
    match ReceiveMode::from_str(&config.receiver.mode) {
        Ok(mode) => println!("  receive mode: {}", mode),
        Err(_) => println!(
            "  receive mode: {} (unknown, runs will do nothing)",
            config.receiver.mode
        ),
    }
    for channel in &config.publish.channels {
        println!(
            "  channel {}: {}",
            channel.name,
            if channel.enabled { "enabled" } else { "disabled" }
        );
    }
    ExitCode::SUCCESS
}

fn run(path: &Path, pass: PassCapture) -> ExitCode {
    let config = match Config::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let executor = Executor::system(config.executor.on_fail);
    log::info!(
        "Starting pass {} of {} at {} (on_fail: {:?})",
        pass.filename_base,
        pass.satellite,
        chrono::Utc::now(),
        executor.on_fail()
    );

    match PassPipeline::new(&config, &executor).run(&pass) {
        Ok(PipelineOutcome::Completed {
            images,
            failed_channels,
        }) => {
            if failed_channels.is_empty() {
                log::info!("Pass {} completed with {} image(s)", pass.filename_base, images);
            } else {
                log::warn!(
                    "Pass {} completed with {} image(s), failed channels: {}",
                    pass.filename_base,
                    images,
                    failed_channels.join(", ")
                );
            }
            ExitCode::SUCCESS
        }
        Ok(PipelineOutcome::Skipped { reason }) => {
            log::info!("Pass {} skipped: {}", pass.filename_base, reason);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Pass {} failed: {}", pass.filename_base, e);
            ExitCode::FAILURE
        }
    }
}

fn canonicalize(mode: &str, name: &str) -> ExitCode {
    let mode = match ReceiveMode::from_str(mode) {
        Ok(m) => m,
        Err(_) => {
            eprintln!("Unknown receive mode: {}", mode);
            return ExitCode::FAILURE;
        }
    };
    println!("{}", canonical_kind(name, CanonicalRule::for_mode(mode)));
    ExitCode::SUCCESS
}
