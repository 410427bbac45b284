//! Flow graph: declares how packets move between stages before anything runs.
//!
//! A flow is opened by a generator or a receiver, may pass through any number
//! of handlers, and must be closed by exactly one of: a sender, a stopper, or
//! a partitioner. A partitioner closes the flow segment feeding it and opens
//! two new ones; the caller's handle keeps following the first, and the
//! returned handle names the second.

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use partcheck_core::Packet;

use crate::error::{BoxError, FlowError};
use crate::port::{Ports, DEFAULT_QUEUE_DEPTH};
use crate::run::{self, Input, Output, Partitioner, RunningFlow, Stage};

pub(crate) type GenerateFn = Box<dyn FnMut(&mut Packet) -> Result<(), BoxError> + Send>;
pub(crate) type HandlerFn = Box<dyn FnMut(&mut Packet) + Send>;

/// Opaque reference to an open flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowHandle(usize);

enum Source {
    Generator { generate: GenerateFn, rate: u64 },
    Receiver { port: u16 },
    /// Fed by the partitioner that closed an upstream segment.
    Split,
}

#[derive(Debug, Clone, Copy)]
enum Terminal {
    Sender { port: u16 },
    Stopper,
    Partition {
        block_a: u64,
        block_b: u64,
        out_a: usize,
        out_b: usize,
    },
}

struct Segment {
    source: Source,
    handlers: Vec<HandlerFn>,
    terminal: Option<Terminal>,
}

impl Segment {
    fn new(source: Source) -> Self {
        Self {
            source,
            handlers: Vec::new(),
            terminal: None,
        }
    }

    fn source_name(&self) -> &'static str {
        match self.source {
            Source::Generator { .. } => "generator",
            Source::Receiver { .. } => "receiver",
            Source::Split => "partition",
        }
    }
}

pub struct FlowGraph {
    ports: Ports,
    segments: Vec<Segment>,
    /// handle index → segment currently open for it
    heads: Vec<usize>,
    rx_ports: HashSet<u16>,
    queue_depth: usize,
}

impl FlowGraph {
    pub fn new(ports: impl Into<Ports>) -> Self {
        Self {
            ports: ports.into(),
            segments: Vec::new(),
            heads: Vec::new(),
            rx_ports: HashSet::new(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    /// Depth of the queues between a partitioner and its two outputs.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    fn open(&mut self, source: Source) -> FlowHandle {
        self.segments.push(Segment::new(source));
        self.heads.push(self.segments.len() - 1);
        FlowHandle(self.heads.len() - 1)
    }

    /// Segment index for an open flow.
    fn head(&self, flow: FlowHandle) -> Result<usize, FlowError> {
        let idx = *self
            .heads
            .get(flow.0)
            .ok_or(FlowError::UnknownFlow(flow.0))?;
        if self.segments[idx].terminal.is_some() {
            return Err(FlowError::FlowClosed(flow.0));
        }
        Ok(idx)
    }

    fn close(&mut self, flow: FlowHandle, terminal: Terminal) -> Result<(), FlowError> {
        let idx = self.head(flow)?;
        self.segments[idx].terminal = Some(terminal);
        Ok(())
    }

    /// Open a flow fed by `generate`, invoked `rate` times per second on a
    /// fresh empty packet. An error from `generate` stops the whole graph.
    pub fn set_generator<F, E>(&mut self, mut callback: F, rate: u64) -> Result<FlowHandle, FlowError>
    where
        F: FnMut(&mut Packet) -> Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        if rate == 0 {
            return Err(FlowError::ZeroRate);
        }
        let generate: GenerateFn =
            Box::new(move |pkt: &mut Packet| callback(pkt).map_err(Into::into));
        Ok(self.open(Source::Generator { generate, rate }))
    }

    /// Open a flow fed by frames arriving on `port`.
    pub fn set_receiver(&mut self, port: u16) -> Result<FlowHandle, FlowError> {
        if !self.rx_ports.insert(port) {
            return Err(FlowError::PortInUse(port));
        }
        Ok(self.open(Source::Receiver { port }))
    }

    /// Run `handler` on every packet of the flow, in declaration order.
    pub fn set_handler<F>(&mut self, flow: FlowHandle, handler: F) -> Result<(), FlowError>
    where
        F: FnMut(&mut Packet) + Send + 'static,
    {
        let idx = self.head(flow)?;
        self.segments[idx].handlers.push(Box::new(handler));
        Ok(())
    }

    /// Close the flow by consuming its packets.
    pub fn set_stopper(&mut self, flow: FlowHandle) -> Result<(), FlowError> {
        self.close(flow, Terminal::Stopper)
    }

    /// Close the flow by transmitting its packets on `port`.
    pub fn set_sender(&mut self, flow: FlowHandle, port: u16) -> Result<(), FlowError> {
        self.close(flow, Terminal::Sender { port })
    }

    /// Split the flow: of every `block_a + block_b` consecutive packets the
    /// first `block_a` stay on `flow`, the rest go to the returned flow.
    /// Both blocks must be non-zero and their sum must fit in a `u64`.
    pub fn set_partitioner(
        &mut self,
        flow: FlowHandle,
        block_a: u64,
        block_b: u64,
    ) -> Result<FlowHandle, FlowError> {
        if block_a == 0 || block_b == 0 || block_a.checked_add(block_b).is_none() {
            return Err(FlowError::InvalidBlock(block_a, block_b));
        }
        let idx = self.head(flow)?;

        self.segments.push(Segment::new(Source::Split));
        let out_a = self.segments.len() - 1;
        self.segments.push(Segment::new(Source::Split));
        let out_b = self.segments.len() - 1;

        self.segments[idx].terminal = Some(Terminal::Partition {
            block_a,
            block_b,
            out_a,
            out_b,
        });
        self.heads[flow.0] = out_a;
        self.heads.push(out_b);
        Ok(FlowHandle(self.heads.len() - 1))
    }

    /// Bind ports and spawn one task per segment on the current runtime.
    /// Returns as soon as everything is spawned.
    pub async fn start(self) -> Result<RunningFlow, FlowError> {
        if let Some(idx) = self.segments.iter().position(|s| s.terminal.is_none()) {
            return Err(FlowError::Unterminated(idx));
        }

        let mut split_tx = Vec::with_capacity(self.segments.len());
        let mut split_rx = Vec::with_capacity(self.segments.len());
        for seg in &self.segments {
            if matches!(seg.source, Source::Split) {
                let (tx, rx) = mpsc::channel::<Packet>(self.queue_depth);
                split_tx.push(Some(tx));
                split_rx.push(Some(rx));
            } else {
                split_tx.push(None);
                split_rx.push(None);
            }
        }

        let mut tasks = JoinSet::new();
        for (idx, seg) in self.segments.into_iter().enumerate() {
            let source = seg.source_name();
            let Some(terminal) = seg.terminal else {
                return Err(FlowError::Unterminated(idx));
            };

            let input = match seg.source {
                Source::Generator { generate, rate } => Input::Generator { generate, rate },
                Source::Receiver { port } => Input::Port(self.ports.open_rx(port).await?),
                Source::Split => Input::Split(
                    split_rx[idx]
                        .take()
                        .ok_or(FlowError::UnknownFlow(idx))?,
                ),
            };
            let output = match terminal {
                Terminal::Sender { port } => Output::Port(self.ports.open_tx(port).await?),
                Terminal::Stopper => Output::Stop,
                Terminal::Partition {
                    block_a,
                    block_b,
                    out_a,
                    out_b,
                } => Output::Partition(Partitioner::new(
                    block_a,
                    block_b,
                    split_tx[out_a].take().ok_or(FlowError::UnknownFlow(out_a))?,
                    split_tx[out_b].take().ok_or(FlowError::UnknownFlow(out_b))?,
                )),
            };

            tracing::debug!(
                segment = idx,
                source,
                handlers = seg.handlers.len(),
                terminal = ?terminal,
                "flow segment starting"
            );
            let stage = Stage::new(idx, seg.handlers, output);
            tasks.spawn(run::run_segment(input, stage));
        }

        tracing::info!(segments = tasks.len(), "flow graph started");
        Ok(RunningFlow::new(tasks))
    }
}
