//! matmul-bench CLI
//!
//! Times a sequential reference matrix product against two parallel
//! strategies on a selected device and checks their results.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mm_bench::{BenchConfig, BenchmarkHarness, ConsoleReport};
use mm_kernels::Platform;
use tracing::info;

/// Benchmark dense matrix multiplication strategies
#[derive(Parser, Debug)]
#[command(name = "matmul-bench")]
#[command(version)]
#[command(long_about = r#"
Benchmark dense matrix multiplication strategies.

Runs a sequential dot-product reference, a one-worker-per-element parallel
kernel and a one-worker-per-row kernel with a private row of A and a
team-shared column of B, then reports time and MFLOPS per repetition.

Run settings come from the environment:
  MATMUL_ORDER       matrix order N (default 1024)
  MATMUL_COUNT       repetitions per strategy (default 1)
  MATMUL_TEAM_SIZE   team size of the row kernel (default N/16)
  MATMUL_TOLERANCE   relative tolerance for verification (default 0.001)
  MATMUL_VERIFY      check results against the reference (default true)
  MATMUL_FILL        'pattern' or 'constant' (default pattern)
  RUST_LOG           log filter (default info)
"#)]
struct Cli {
    /// Index of the device to run on (see --list)
    #[arg(short, long, value_name = "INDEX", default_value_t = 0)]
    device: usize,

    /// List available devices and exit
    #[arg(short, long)]
    list: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so they never interleave with the report on stdout.
fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let platform = Platform::host();

    if cli.list {
        println!("Available devices:");
        for info in platform.devices() {
            println!("  {info}");
        }
        return Ok(());
    }

    let device = platform
        .select(cli.device)
        .context("device selection failed")?;
    let config = BenchConfig::from_env().context("invalid configuration")?;

    println!("\nUsing device: {}", device.info().name);

    let mut harness =
        BenchmarkHarness::from_config(&config, device).context("failed to set up strategies")?;
    let mut report = ConsoleReport::new(io::stdout().lock());
    let summary = harness.run(&mut report).context("benchmark aborted")?;

    info!(
        repetitions = summary.results.len(),
        mismatches = summary.mismatches(),
        "benchmark finished"
    );
    Ok(())
}
