//! Running flow segments: one task per segment, supervised through a JoinSet.

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use partcheck_core::Packet;

use crate::error::FlowError;
use crate::graph::{GenerateFn, HandlerFn};
use crate::port::{PortRx, PortTx};
use crate::rate::{TokenBucket, TICK};

pub(crate) enum Input {
    Generator { generate: GenerateFn, rate: u64 },
    Port(PortRx),
    Split(mpsc::Receiver<Packet>),
}

pub(crate) enum Output {
    Port(PortTx),
    Stop,
    Partition(Partitioner),
}

/// Routes packets by position in a repeating `block_a + block_b` cycle.
pub(crate) struct Partitioner {
    block_a: u64,
    period: u64,
    position: u64,
    out_a: mpsc::Sender<Packet>,
    out_b: mpsc::Sender<Packet>,
}

impl Partitioner {
    pub(crate) fn new(
        block_a: u64,
        block_b: u64,
        out_a: mpsc::Sender<Packet>,
        out_b: mpsc::Sender<Packet>,
    ) -> Self {
        Self {
            block_a,
            period: block_a.saturating_add(block_b).max(1),
            position: 0,
            out_a,
            out_b,
        }
    }

    /// Which output the next packet takes, advancing the cycle.
    fn next_is_a(&mut self) -> bool {
        let is_a = self.position < self.block_a;
        self.position = (self.position + 1) % self.period;
        is_a
    }
}

/// Handlers plus terminal for one segment.
pub(crate) struct Stage {
    segment: usize,
    handlers: Vec<HandlerFn>,
    output: Output,
}

impl Stage {
    pub(crate) fn new(segment: usize, handlers: Vec<HandlerFn>, output: Output) -> Self {
        Self {
            segment,
            handlers,
            output,
        }
    }

    async fn push(&mut self, mut pkt: Packet) -> Result<(), FlowError> {
        for handler in &mut self.handlers {
            handler(&mut pkt);
        }
        match &mut self.output {
            Output::Port(tx) => tx.send(pkt.freeze()).await,
            Output::Stop => Ok(()),
            Output::Partition(p) => {
                let out = if p.next_is_a() { &p.out_a } else { &p.out_b };
                out.send(pkt)
                    .await
                    .map_err(|_| FlowError::StageClosed(self.segment))
            }
        }
    }
}

pub(crate) async fn run_segment(input: Input, mut stage: Stage) -> Result<(), FlowError> {
    match input {
        Input::Generator { mut generate, rate } => {
            let mut bucket = TokenBucket::new(rate);
            let mut tick = tokio::time::interval(TICK);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                for _ in 0..bucket.take_available() {
                    let mut pkt = Packet::new();
                    if let Err(e) = generate(&mut pkt) {
                        tracing::error!(segment = stage.segment, error = %e, "generator failed");
                        return Err(FlowError::Fatal(e));
                    }
                    stage.push(pkt).await?;
                }
            }
        }
        Input::Port(mut rx) => loop {
            let frame = rx.recv().await?;
            stage.push(Packet::from_frame(&frame)).await?;
        },
        Input::Split(mut rx) => {
            while let Some(pkt) = rx.recv().await {
                stage.push(pkt).await?;
            }
            tracing::debug!(segment = stage.segment, "upstream partitioner closed");
            Ok(())
        }
    }
}

/// Handle to a started graph. Dropping it aborts every segment task.
pub struct RunningFlow {
    tasks: JoinSet<Result<(), FlowError>>,
}

impl RunningFlow {
    pub(crate) fn new(tasks: JoinSet<Result<(), FlowError>>) -> Self {
        Self { tasks }
    }

    /// Resolves with the first segment failure. Never resolves while the
    /// graph is healthy. Cancel safe.
    pub async fn failure(&mut self) -> FlowError {
        loop {
            match self.tasks.join_next().await {
                Some(Ok(Ok(()))) => continue,
                Some(Ok(Err(e))) => return e,
                Some(Err(join)) => return FlowError::TaskPanicked(join.to_string()),
                None => std::future::pending::<()>().await,
            }
        }
    }

    /// Abort every segment task.
    pub fn stop(&mut self) {
        self.tasks.abort_all();
        tracing::info!("flow graph stopped");
    }

    pub fn segments(&self) -> usize {
        self.tasks.len()
    }
}
