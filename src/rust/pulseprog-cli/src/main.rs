// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Pulse program command-line tool.
//!
//! ```bash
//! # Compile timelines into the instruction tables of a device
//! pulseprog compile --device board.json --events events.json --output program.json
//!
//! # Replay the tables, aligned to the rising edges of a reference clock
//! pulseprog decode --device board.json --program program.json --reference master.json
//!
//! # Show the trigger edges found in a reference clock trace
//! pulseprog edges --reference master.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use log::LevelFilter;
use pulse_log::{info, warn};

use pulse_program::{
    ClockTrace, DeviceConfig, ProgramDataset, PulseEvent, Trace, compile_device, replay_device,
    rising_edges,
};

/// Compile and replay pseudoclock pulse programs
#[derive(Parser)]
#[command(name = "pulseprog")]
#[command(version)]
#[command(about = "Compile and replay run-length pulse programs")]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: LevelFilter,

    /// Log diagnostics such as unused trigger edges
    #[arg(long, global = true)]
    diagnostics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile per-table event timelines into a program dataset
    Compile {
        /// Device configuration
        #[arg(short, long, env = "PULSEPROG_DEVICE")]
        device: PathBuf,

        /// Timelines keyed by table name
        #[arg(short, long)]
        events: PathBuf,

        /// Where to write the dataset; nothing is written if compilation fails
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Reconstruct the channel traces of a program dataset
    Decode {
        /// Device configuration
        #[arg(short, long, env = "PULSEPROG_DEVICE")]
        device: PathBuf,

        /// Program dataset written by `compile`
        #[arg(short, long)]
        program: PathBuf,

        /// Reference clock trace whose rising edges trigger the device
        #[arg(short, long)]
        reference: Option<PathBuf>,

        /// Where to write the traces, stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the rising edges of a reference clock trace
    Edges {
        /// Reference clock trace
        #[arg(short, long)]
        reference: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level)
        .parse_default_env()
        .init();
    pulse_log::init_logging(cli.diagnostics);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            for cause in error.chain().skip(1) {
                eprintln!("  caused by: {cause}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Compile {
            device,
            events,
            output,
        } => {
            let config = load_device(&device)?;
            let timelines: IndexMap<String, Vec<PulseEvent>> =
                serde_json::from_str(&read(&events)?)
                    .with_context(|| format!("Failed to parse events file {}", events.display()))?;
            let dataset = compile_device(&config, &timelines)
                .with_context(|| format!("Failed to compile device '{}'", config.name))?;
            dataset
                .write(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("wrote {} tables to {}", dataset.tables.len(), output.display());
        }

        Commands::Decode {
            device,
            program,
            reference,
            output,
        } => {
            let config = load_device(&device)?;
            let dataset = ProgramDataset::read(&program)
                .with_context(|| format!("Failed to read program {}", program.display()))?;
            let reference = reference.as_deref().map(load_reference).transpose()?;

            let mut traces: IndexMap<String, Trace> = IndexMap::new();
            let report = replay_device(&config, &dataset, reference.as_ref(), &mut traces)
                .with_context(|| format!("Failed to replay device '{}'", config.name))?;

            let json = serde_json::to_string_pretty(&traces)?;
            match &output {
                Some(path) => fs::write(path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{json}"),
            }

            let failed: Vec<&str> = report.failures.iter().map(|(n, _)| n.as_str()).collect();
            if !failed.is_empty() {
                warn!("tables without traces: {}", failed.join(", "));
                let failed_count = failed.len();
                report
                    .into_result()
                    .with_context(|| format!("{failed_count} tables could not be replayed"))?;
            }
        }

        Commands::Edges { reference } => {
            let edges = rising_edges(&load_reference(&reference)?);
            if edges.is_empty() {
                warn!("{} contains no rising edges", reference.display());
            }
            println!("{}", serde_json::to_string_pretty(&edges)?);
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn load_device(path: &Path) -> Result<DeviceConfig> {
    DeviceConfig::load(path)
        .with_context(|| format!("Failed to load device configuration {}", path.display()))
}

fn load_reference(path: &Path) -> Result<ClockTrace> {
    serde_json::from_str(&read(path)?)
        .with_context(|| format!("Failed to parse reference trace {}", path.display()))
}
