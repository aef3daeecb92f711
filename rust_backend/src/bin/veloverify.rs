//! Pole permission verification CLI
//!
//! # Usage
//!
//! ```bash
//! # Run the full pipeline and write every sheet as CSV
//! veloverify process extract.csv --config settings.toml --dump-dir out/
//!
//! # Force a strategy instead of choosing from file size
//! veloverify process extract.csv --strategy disk
//!
//! # Only print the validation report
//! veloverify validate extract.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log filter (default: info)

use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use veloverify::config::PipelineConfig;
use veloverify::execution::ExecutionStrategy;
use veloverify::io::{dump_sheets_csv, DatasetLoader};
use veloverify::preprocessing::{progress_channel, DataValidator, ProcessingPipeline};

const USAGE: &str = "\
Usage:
  veloverify process <file> [--config <toml>] [--dump-dir <dir>] [--strategy memory|chunked|disk]
  veloverify validate <file> [--config <toml>]";

#[derive(Debug)]
enum Command {
    Process,
    Validate,
}

#[derive(Debug)]
struct Args {
    command: Command,
    input: PathBuf,
    config: Option<PathBuf>,
    dump_dir: Option<PathBuf>,
    strategy: Option<ExecutionStrategy>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let command = match args.next().as_deref() {
        Some("process") => Command::Process,
        Some("validate") => Command::Validate,
        Some(other) => bail!("Unknown command: {}\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    };

    let mut input = None;
    let mut config = None;
    let mut dump_dir = None;
    let mut strategy = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(args.next().context("--config needs a path")?)),
            "--dump-dir" => {
                dump_dir = Some(PathBuf::from(args.next().context("--dump-dir needs a path")?))
            }
            "--strategy" => {
                let value = args.next().context("--strategy needs a value")?;
                strategy = Some(value.parse::<ExecutionStrategy>().map_err(anyhow::Error::msg)?);
            }
            flag if flag.starts_with("--") => bail!("Unknown option: {}\n{}", flag, USAGE),
            path if input.is_none() => input = Some(PathBuf::from(path)),
            extra => bail!("Unexpected argument: {}\n{}", extra, USAGE),
        }
    }

    Ok(Args {
        command,
        input: input.with_context(|| format!("Missing input file\n{}", USAGE))?,
        config,
        dump_dir,
        strategy,
    })
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::from_file(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_process(args: &Args, config: PipelineConfig) -> Result<()> {
    let (tx, mut rx) = progress_channel();
    let printer = thread::spawn(move || {
        while let Some(event) = rx.blocking_recv() {
            println!("[{:>5.1}%] {}", event.percent, event.stage);
        }
    });

    let mut pipeline = ProcessingPipeline::new(config).with_progress(tx);
    if let Some(strategy) = args.strategy {
        pipeline = pipeline.with_strategy(strategy);
    }
    let result = pipeline.process(&args.input);
    drop(pipeline);
    let _ = printer.join();

    let output = result.with_context(|| format!("Processing {} failed", args.input.display()))?;

    println!();
    for (metric, value) in output.stats.summary_rows() {
        println!("  {:<28} {}", metric, value);
    }
    println!();
    for sheet in output.sheets.iter() {
        println!("  {:<32} {:>8} rows", sheet.name, sheet.data.height());
    }

    if let Some(dir) = &args.dump_dir {
        let written = dump_sheets_csv(&output.sheets, dir)?;
        info!("Wrote {} sheets to {}", written.len(), dir.display());
    }

    Ok(())
}

fn run_validate(args: &Args, config: PipelineConfig) -> Result<()> {
    let preference = config.encoding_preference()?;
    let loaded = DatasetLoader::load_from_file(&args.input, preference)?;
    info!(
        "Validating {} rows ({})",
        loaded.num_rows, loaded.encoding
    );

    let report = DataValidator::new(config.data_validation.clone()).validate(&loaded.dataframe);
    println!("{}", report.summary());

    if !report.is_valid {
        bail!("Validation failed with {} errors", report.errors.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Process => run_process(&args, config),
        Command::Validate => run_validate(&args, config),
    }
}
