//! partcheck integration tests.
//!
//! Every scenario runs both halves of the stability test inside one process:
//! Part 1 (generator and validators) and a Part 2 graph on the far side of
//! the wire. The wire is either a cross-connected pair of in-memory NICs,
//! which is lossless and backpressured, or loopback UDP sockets.
//!
//!   cargo test --test integration

use std::time::Duration;

use anyhow::{Context, Result};

use partcheck_core::config::PartcheckConfig;
use partcheck_flow::{FlowError, FlowGraph, MemoryNic, Ports};
use partcheck_harness::{CounterSnapshot, Harness, PartitionTopology, Report};

mod faults;
mod pipeline;
mod udp;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Upper bound on one scenario, start to verdict.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(60);

/// Queue depth on both sides of the wire. Kept small so packets still in
/// flight at completion are a negligible share of those sent.
pub const QUEUE_DEPTH: usize = 256;

/// Time for aborted segment tasks to finish the packet they were handling.
const SETTLE: Duration = Duration::from_millis(100);

/// Reference scenario scaled down to `sample_target` packets at `speed`.
pub fn scenario_config(sample_target: u64, speed: u64) -> PartcheckConfig {
    let mut config = PartcheckConfig::default();
    config.run.sample_target = sample_target;
    config.run.speed = speed;
    config
}

pub fn memory_wire() -> (MemoryNic, MemoryNic) {
    MemoryNic::pair_with_depth(QUEUE_DEPTH)
}

/// Part 2 exactly as the partitioner binary declares it.
pub fn reference_part2(config: &PartcheckConfig) -> impl FnOnce(&mut FlowGraph) -> Result<(), FlowError> {
    let topology = PartitionTopology::from_config(&config.partition);
    move |graph| topology.install(graph)
}

/// Result of a scenario that reached its sample target.
pub struct Finished {
    pub report: Report,
    /// Counters once both graphs were stopped and idle.
    pub settled: CounterSnapshot,
}

/// Start `part2` on `far_ports`, then Part 1 on `near_ports`, and wait for a
/// verdict. A failure on either side ends the scenario with an error.
pub async fn run_scenario<F>(
    config: &PartcheckConfig,
    near_ports: impl Into<Ports>,
    far_ports: impl Into<Ports>,
    part2: F,
) -> Result<Finished>
where
    F: FnOnce(&mut FlowGraph) -> Result<(), FlowError>,
{
    let mut far = FlowGraph::new(far_ports).with_queue_depth(QUEUE_DEPTH);
    part2(&mut far).context("failed to declare part 2")?;
    let mut far = far.start().await.context("failed to start part 2")?;

    let harness = Harness::from_config(config);
    let mut near = FlowGraph::new(near_ports).with_queue_depth(QUEUE_DEPTH);
    harness
        .install(&mut near, &config.generator)
        .context("failed to declare part 1")?;
    let mut near = near.start().await.context("failed to start part 1")?;

    let outcome = tokio::time::timeout(RUN_TIMEOUT, async {
        tokio::select! {
            report = harness.run(&mut near) => report.context("part 1 aborted"),
            err = far.failure() => Err(err).context("part 2 failed"),
        }
    })
    .await
    .context("sample target not reached in time")?;

    near.stop();
    far.stop();
    let report = outcome?;
    tokio::time::sleep(SETTLE).await;
    Ok(Finished {
        report,
        settled: harness.counters().snapshot(),
    })
}
