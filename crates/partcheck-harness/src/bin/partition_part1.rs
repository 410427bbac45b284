//! partition-part1 — generate tagged traffic on one port, validate what comes
//! back on two, and print the verdict.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use partcheck_core::config::PartcheckConfig;
use partcheck_flow::{FlowGraph, UdpPorts};
use partcheck_harness::{Harness, PartitionTopology, Report};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "partition-part1", about = "Traffic partition stability test: generator and validators")]
struct Cli {
    /// received/sent minimum ratio to pass test
    #[arg(long = "PASSED_LIMIT", value_name = "PERCENT")]
    passed_limit: Option<u64>,

    /// speed of generator, Pkts/s
    #[arg(long = "SPEED", value_name = "PPS")]
    speed: Option<u64>,

    /// config file (default: $PARTCHECK_CONFIG or the XDG config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report_format: ReportFormat,
}

/// Also accept `-PASSED_LIMIT` and `-SPEED` with a single dash.
fn widen_single_dash(arg: OsString) -> OsString {
    match arg.to_str() {
        Some(s) if s.starts_with("-PASSED_LIMIT") || s.starts_with("-SPEED") => format!("-{s}").into(),
        _ => arg,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_from(std::env::args_os().map(widen_single_dash));
    let mut config = match &cli.config {
        Some(path) => PartcheckConfig::load_from(path),
        None => PartcheckConfig::load(),
    }
    .context("failed to load config")?;
    if let Some(limit) = cli.passed_limit {
        config.run.passed_limit = limit;
    }
    if let Some(speed) = cli.speed {
        config.run.speed = speed;
    }

    tracing::info!(
        cores = config.run.cores,
        speed = config.run.speed,
        passed_limit = config.run.passed_limit,
        sample_target = config.run.sample_target,
        "partition-part1 starting"
    );

    let runtime = partcheck_flow::runtime(config.run.cores).context("failed to start worker pool")?;
    let report = runtime.block_on(run(&config))?;

    match cli.report_format {
        ReportFormat::Text => print!("{report}"),
        ReportFormat::Json => println!("{}", report.to_json().context("failed to render report")?),
    }
    Ok(())
}

async fn run(config: &PartcheckConfig) -> Result<Report> {
    let harness = Harness::from_config(config);
    PartitionTopology::from_config(&config.partition).warn_on_unreachable_bands(harness.criteria());

    let mut graph = FlowGraph::new(UdpPorts::new(config.ports.generator_links.iter().copied()));
    harness
        .install(&mut graph, &config.generator)
        .context("failed to declare flow graph")?;
    let mut running = graph.start().await.context("failed to start flow graph")?;

    let report = harness.run(&mut running).await.context("run aborted")?;
    running.stop();
    Ok(report)
}
