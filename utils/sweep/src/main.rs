use std::process::ExitCode;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use sweep::{SweepReport, Verdict, discover_logs, parse_log_file, run_long, run_sweep};
use sweepgen::{SweepSettings, long_delay, render_preview, render_script, write_script};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "timer-sweep")]
#[command(about = "Clock/delay sweep driver and report for the timer testbench")]
#[command(version)]
struct Args {
    /// Sweep settings (YAML); built-in defaults are used if the file is absent
    #[arg(long, global = true, default_value = "sweep.yaml")]
    config: Utf8PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configuration matrix and write the driver script
    Generate {
        /// Script path (defaults to the `script` setting)
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,
    },
    /// Run every configuration and capture one log per configuration
    Run {
        /// Exit with a non-zero status if any configuration failed
        #[arg(long)]
        strict: bool,
    },
    /// Summarize the captured logs
    Report {
        /// Directory holding `sweep_*.log` (defaults to the `resultsDir` setting)
        #[arg(long)]
        dir: Option<Utf8PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value_t = ReportFormat::Human)]
        format: ReportFormat,
        /// Exit with a non-zero status on failures or missing results
        #[arg(long)]
        strict: bool,
    },
    /// Run the standalone 10 MHz / 1 s long-delay test
    Long,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Human,
    Json,
}

fn status(strict: bool, ok: bool) -> ExitCode {
    if strict && !ok {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn generate(settings: &SweepSettings, output: Option<Utf8PathBuf>) -> Result<ExitCode> {
    print!("{}", render_preview(&settings.configurations));
    println!();

    let path = output
        .map(Utf8PathBuf::into_std_path_buf)
        .unwrap_or_else(|| settings.script.clone());
    write_script(&path, &render_script(settings))?;
    println!("Wrote {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn report(
    settings: &SweepSettings,
    dir: Option<Utf8PathBuf>,
    format: ReportFormat,
    strict: bool,
) -> Result<ExitCode> {
    let dir = dir
        .map(Utf8PathBuf::into_std_path_buf)
        .unwrap_or_else(|| settings.results_dir.clone());
    let logs = discover_logs(&dir).context("Failed to search for sweep logs")?;

    if logs.files.is_empty() {
        println!("❌ No sweep log files found!");
        println!("   Expected files matching: {}", logs.pattern);
        println!("   Run: timer-sweep run  (or ./{})", settings.script.display());
        return Ok(status(strict, false));
    }

    let results = logs.files.iter().map(|path| parse_log_file(path)).collect();
    let report = SweepReport::new(logs.source, logs.files, results);

    match format {
        ReportFormat::Human => print!("{report}"),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report.json_summary())?),
    }

    Ok(status(
        strict,
        report.aggregate.verdict() == Verdict::Success,
    ))
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = SweepSettings::load_or_default(args.config.as_std_path())
        .context(format!("Failed to load sweep settings from {}", args.config))?;

    match args.command {
        Commands::Generate { output } => generate(&settings, output),
        Commands::Run { strict } => {
            let outcome = run_sweep(&settings)?;
            Ok(status(strict, outcome.failed() == 0))
        }
        Commands::Report {
            dir,
            format,
            strict,
        } => report(&settings, dir, format, strict),
        Commands::Long => {
            run_long(&settings, &long_delay())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
