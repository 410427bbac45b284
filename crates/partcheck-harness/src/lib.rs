//! partcheck-harness — stability test for a traffic-partitioning pipeline.
//!
//! Part 1 generates tagged traffic, validates what comes back on two paths
//! and judges the split; Part 2 is the partition topology under test.

pub mod completion;
pub mod evaluator;
pub mod harness;
pub mod stats;
pub mod tagger;
pub mod topology;
pub mod validator;

pub use completion::Completion;
pub use evaluator::{evaluate, PassCriteria, Report, Shortfall, ToleranceBand, Verdict};
pub use harness::Harness;
pub use stats::{CounterSnapshot, Counters, RxPath};
pub use tagger::{GenerateError, Tagger};
pub use topology::{PartitionBlock, PartitionTopology};
pub use validator::{Arrival, Validator};
