//! stl2scad command-line front end
//!
//! Usage:
//!   stl2scad part.stl                 Write part.scad next to part.stl
//!   stl2scad a.stl b.stl --workers 0  Convert several files, aggregating in parallel
//!   stl2scad part.stl --stdout        Print the source instead of writing it

use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use stl2scad::utils::strip_quotes_from_path;
use stl2scad::{convert_file, output_path_for, ConvertOptions, RunLog, StlFormat};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stl2scad", version, about = "Convert STL meshes into OpenSCAD modules")]
struct Cli {
    /// STL files to convert
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Digits kept after the decimal point
    #[arg(long, default_value_t = stl2scad::NumberFormat::DEFAULT_DECIMAL_PLACES)]
    decimals: usize,

    /// Stop aggregating after this many milliseconds per file
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Skip format detection
    #[arg(long, value_parser = parse_format)]
    format: Option<StlFormat>,

    /// Aggregation threads (0 = all cores, 1 = no pool)
    #[arg(long)]
    workers: Option<usize>,

    /// Module name (single input only; defaults to the file stem)
    #[arg(long)]
    module_name: Option<String>,

    /// Keep output from a conversion cut short by --timeout-ms
    #[arg(long)]
    allow_partial: bool,

    /// Write a run log to this file (or a timestamped file in this directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Also print run log lines on stderr
    #[arg(long, requires = "log_file")]
    log_echo: bool,

    /// Print the generated source instead of writing <stem>.scad
    #[arg(long)]
    stdout: bool,

    /// Debug-level diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn parse_format(value: &str) -> Result<StlFormat, String> {
    value.parse().map_err(|e: stl2scad::Error| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    if cli.module_name.is_some() && cli.inputs.len() > 1 {
        error!("--module-name can only be used with a single input");
        return ExitCode::from(2);
    }

    let mut options = ConvertOptions::new().with_decimal_places(cli.decimals);
    options.deadline = cli.timeout_ms.map(Duration::from_millis);
    options.force_format = cli.format;
    options.workers = cli.workers;
    options.identifier = cli.module_name.clone();
    if let Err(e) = options.validate() {
        error!("{}", e);
        return ExitCode::from(2);
    }

    let log = match &cli.log_file {
        Some(path) => match RunLog::new(path, cli.log_echo) {
            Ok(log) => Some(log),
            Err(e) => {
                error!("{}", e);
                return ExitCode::from(2);
            }
        },
        None => None,
    };

    let mut failures = 0usize;
    for input in &cli.inputs {
        let input = PathBuf::from(strip_quotes_from_path(input));
        let recorded = match convert_one(&input, &options, &cli) {
            Ok((output, partial)) => log
                .as_ref()
                .map(|log| log.converted(&input, output.as_deref(), partial)),
            Err(message) => {
                failures += 1;
                error!("{}", message);
                log.as_ref().map(|log| log.failed(&input, &message))
            }
        };
        if let Some(Err(e)) = recorded {
            warn!("run log write failed: {}", e);
        }
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Convert and write one file. Returns where the source went (`None` for
/// stdout) and whether it is partial.
fn convert_one(
    input: &Path,
    options: &ConvertOptions,
    cli: &Cli,
) -> Result<(Option<PathBuf>, bool), String> {
    if !input.is_file() {
        return Err(format!("{}: no such file", input.display()));
    }

    let conversion = convert_file(input, options).map_err(|e| e.to_string())?;
    let conversion = if cli.allow_partial {
        if conversion.is_partial() {
            warn!(
                "{}: deadline exceeded, writing {} triangles only",
                input.display(),
                conversion.triangle_count()
            );
        }
        conversion
    } else {
        conversion
            .into_complete()
            .map_err(|e| format!("{}: {}", input.display(), e))?
    };

    let partial = conversion.is_partial();
    if cli.stdout {
        print!("{}", conversion.text());
        return Ok((None, partial));
    }

    let output = output_path_for(input);
    fs::write(&output, conversion.text())
        .map_err(|e| format!("{}: write failed: {}", output.display(), e))?;
    Ok((Some(output), partial))
}
