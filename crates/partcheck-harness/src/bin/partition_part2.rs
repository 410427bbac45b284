//! partition-part2 — the partition topology under test. Runs until the
//! pipeline fails or the process is interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use partcheck_core::config::PartcheckConfig;
use partcheck_flow::{FlowGraph, UdpPorts};
use partcheck_harness::PartitionTopology;

#[derive(Debug, Parser)]
#[command(name = "partition-part2", about = "Traffic partition stability test: partitioner")]
struct Cli {
    /// config file (default: $PARTCHECK_CONFIG or the XDG config dir)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PartcheckConfig::load_from(path),
        None => PartcheckConfig::load(),
    }
    .context("failed to load config")?;

    let runtime = partcheck_flow::runtime(config.run.cores).context("failed to start worker pool")?;
    runtime.block_on(run(&config))
}

async fn run(config: &PartcheckConfig) -> Result<()> {
    let topology = PartitionTopology::from_config(&config.partition);
    let mut graph = FlowGraph::new(UdpPorts::new(config.ports.partitioner_links.iter().copied()));
    topology
        .install(&mut graph)
        .context("failed to declare flow graph")?;
    let mut running = graph.start().await.context("failed to start flow graph")?;
    tracing::info!("partition-part2 running");

    tokio::select! {
        err = running.failure() => Err(err).context("pipeline failed"),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for interrupt")?;
            tracing::info!("interrupted, shutting down");
            running.stop();
            Ok(())
        }
    }
}
