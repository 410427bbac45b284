//! Part 2: the partition topology under test.
//!
//! ```text
//!   receiver(input_port) ──► partitioner(block_a, block_b) ─┬─► sender(output_a)
//!                                                           └─► sender(output_b)
//! ```

use serde::Serialize;

use partcheck_core::config::PartitionConfig;
use partcheck_flow::{FlowError, FlowGraph};

use crate::evaluator::PassCriteria;
use crate::stats::RxPath;

/// Of every `count_a + count_b` consecutive packets, the first `count_a` go
/// to output A and the rest to output B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionBlock {
    pub count_a: u64,
    pub count_b: u64,
}

impl PartitionBlock {
    pub fn new(count_a: u64, count_b: u64) -> Self {
        Self { count_a, count_b }
    }

    /// Length of one full cycle, or `None` if it does not fit in a `u64`.
    pub fn period(&self) -> Option<u64> {
        self.count_a.checked_add(self.count_b)
    }

    /// Long-run percentage of traffic each output receives.
    pub fn expected_shares(&self) -> [f64; 2] {
        let period = self.count_a as f64 + self.count_b as f64;
        if period == 0.0 {
            return [0.0, 0.0];
        }
        let a = self.count_a as f64 * 100.0 / period;
        [a, 100.0 - a]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionTopology {
    pub input_port: u16,
    pub block: PartitionBlock,
    pub output_a: u16,
    pub output_b: u16,
}

impl PartitionTopology {
    pub fn from_config(cfg: &PartitionConfig) -> Self {
        Self {
            input_port: cfg.input_port,
            block: PartitionBlock::new(cfg.block_a, cfg.block_b),
            output_a: cfg.output_a,
            output_b: cfg.output_b,
        }
    }

    /// Declare the topology on `graph`.
    pub fn install(&self, graph: &mut FlowGraph) -> Result<(), FlowError> {
        let flow = graph.set_receiver(self.input_port)?;
        let second = graph.set_partitioner(flow, self.block.count_a, self.block.count_b)?;
        graph.set_sender(flow, self.output_a)?;
        graph.set_sender(second, self.output_b)?;
        tracing::info!(
            input = self.input_port,
            block_a = self.block.count_a,
            block_b = self.block.count_b,
            output_a = self.output_a,
            output_b = self.output_b,
            "partition topology declared"
        );
        Ok(())
    }

    /// Paths whose tolerance band cannot contain the share this block
    /// produces, with that share. A clean run against such criteria fails.
    pub fn unreachable_bands(&self, criteria: &PassCriteria) -> Vec<(RxPath, f64)> {
        let shares = self.block.expected_shares();
        RxPath::ALL
            .into_iter()
            .filter_map(|path| {
                let band = criteria.band(path);
                let share = shares[path.index()];
                let inside = share >= band.low() as f64 && share <= band.high() as f64;
                (!inside).then_some((path, share))
            })
            .collect()
    }

    /// Log a warning for every band the block cannot satisfy.
    pub fn warn_on_unreachable_bands(&self, criteria: &PassCriteria) {
        for (path, share) in self.unreachable_bands(criteria) {
            let band = criteria.band(path);
            tracing::warn!(
                path = %path,
                expected_share = share,
                band = %band,
                "partition block cannot produce a share inside this band"
            );
        }
    }
}
