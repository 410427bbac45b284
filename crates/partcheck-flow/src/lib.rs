//! partcheck-flow — the packet-flow pipeline the stability tests drive.
//!
//! A flow graph is declared up front (generators, receivers, handlers,
//! partitioners, senders, stoppers), then started on a multi-threaded
//! runtime. Each flow segment runs as its own task; packets move between
//! segments over bounded channels and between processes over ports.

pub mod error;
pub mod graph;
pub mod port;
pub mod rate;
mod run;

pub use error::{BoxError, FlowError};
pub use graph::{FlowGraph, FlowHandle};
pub use port::{MemoryNic, Ports, UdpPorts};
pub use run::RunningFlow;

/// Build the worker pool every flow graph in this process runs on.
pub fn runtime(cores: usize) -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cores.max(1))
        .thread_name("partcheck-worker")
        .enable_all()
        .build()
}
