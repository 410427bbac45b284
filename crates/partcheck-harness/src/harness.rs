//! Part 1 wiring: tagger on the transmit port, a validator on each receive
//! port, and the control task that waits for completion or failure.

use std::sync::Arc;

use partcheck_core::config::{GeneratorConfig, PartcheckConfig};
use partcheck_core::Packet;
use partcheck_flow::{FlowError, FlowGraph, RunningFlow};

use crate::completion::Completion;
use crate::evaluator::{self, PassCriteria, Report};
use crate::stats::{Counters, RxPath};
use crate::tagger::Tagger;
use crate::validator::Validator;

/// Shared state of one generator/validator run.
#[derive(Debug)]
pub struct Harness {
    counters: Arc<Counters>,
    completion: Arc<Completion>,
    criteria: PassCriteria,
    sample_target: u64,
    speed: u64,
}

impl Harness {
    pub fn new(criteria: PassCriteria, sample_target: u64, speed: u64) -> Self {
        Self {
            counters: Arc::new(Counters::new()),
            completion: Arc::new(Completion::new()),
            criteria,
            sample_target,
            speed,
        }
    }

    pub fn from_config(cfg: &PartcheckConfig) -> Self {
        Self::new(
            PassCriteria::from_config(cfg),
            cfg.run.sample_target,
            cfg.run.speed,
        )
    }

    pub fn criteria(&self) -> &PassCriteria {
        &self.criteria
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    pub fn completion(&self) -> &Arc<Completion> {
        &self.completion
    }

    /// Declare the generator flow and both validator flows on `graph`.
    pub fn install(&self, graph: &mut FlowGraph, ports: &GeneratorConfig) -> Result<(), FlowError> {
        let tagger = Tagger::new(self.counters.clone());
        let out = graph.set_generator(
            move |pkt: &mut Packet| tagger.generate(pkt).map(|_| ()),
            self.speed,
        )?;
        graph.set_sender(out, ports.tx_port)?;

        for (path, port) in RxPath::ALL.into_iter().zip(ports.rx_ports) {
            let validator = Validator::new(
                path,
                self.counters.clone(),
                self.completion.clone(),
                self.sample_target,
            );
            let flow = graph.set_receiver(port)?;
            graph.set_handler(flow, move |pkt: &mut Packet| {
                validator.check(pkt);
            })?;
            graph.set_stopper(flow)?;
        }

        tracing::info!(
            tx_port = ports.tx_port,
            rx_port0 = ports.rx_ports[0],
            rx_port1 = ports.rx_ports[1],
            speed = self.speed,
            sample_target = self.sample_target,
            "generator and validators declared"
        );
        Ok(())
    }

    /// Block until enough samples have arrived, then evaluate once.
    ///
    /// A pipeline failure before that point ends the run with no verdict.
    pub async fn run(&self, running: &mut RunningFlow) -> Result<Report, FlowError> {
        tokio::select! {
            _ = self.completion.wait() => {}
            err = running.failure() => {
                tracing::error!(error = %err, "pipeline failed before the sample target was reached");
                return Err(err);
            }
        }

        let report = self.evaluate();
        tracing::info!(
            sent = report.counters.sent,
            received = report.received,
            broken = report.counters.broken,
            verdict = %report.verdict,
            "run evaluated"
        );
        Ok(report)
    }

    /// Evaluate the counters as they stand now.
    pub fn evaluate(&self) -> Report {
        evaluator::evaluate(self.counters.snapshot(), &self.criteria)
    }
}
