use anyhow::{Result, bail};
use clap::Parser;
use oncelog::{Scenario, ThreadCount};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Stress a logger registry with simultaneous first-time lookups"
)]
struct Cli {
    /// Number of sequential runs
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Fixed number of worker threads (overrides --base/--multiplier)
    #[arg(long)]
    threads: Option<usize>,

    /// Workers added on top of the scaled count
    #[arg(long, default_value_t = 4)]
    base: usize,

    /// Workers per available hardware thread
    #[arg(long, default_value_t = 2)]
    multiplier: usize,

    /// Deadline for the rendezvous and for the workers, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Emit once more through every worker's logger after the run
    #[arg(long)]
    reuse_handles: bool,

    /// Prefix for each run's logger namespace
    #[arg(long)]
    prefix: Option<String>,

    /// Print one JSON report per run
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oncelog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if cli.runs == 0 {
        bail!("--runs must be at least 1");
    }

    let threads = match cli.threads {
        Some(n) => ThreadCount::Fixed(n),
        None => ThreadCount::Scaled {
            base: cli.base,
            multiplier: cli.multiplier,
        },
    };

    let mut scenario = Scenario::new()
        .threads(threads)
        .timeout(Duration::from_millis(cli.timeout_ms))
        .reuse_handles(cli.reuse_handles);
    if let Some(prefix) = &cli.prefix {
        scenario = scenario.prefix(prefix);
    }

    for report in scenario.repeat(cli.runs)? {
        if cli.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!(
                "{}: {} threads, {}/{} events recorded in {} ms",
                report.namespace, report.threads, report.recorded, report.expected, report.elapsed_ms
            );
        }
    }
    Ok(())
}
