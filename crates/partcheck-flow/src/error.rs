/// Boxed error returned by generator callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from building or running a flow graph.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("unknown flow handle {0}")]
    UnknownFlow(usize),

    #[error("flow {0} is already closed")]
    FlowClosed(usize),

    #[error("flow segment {0} was never closed with a sender, stopper or partitioner")]
    Unterminated(usize),

    #[error("generator rate must be non-zero")]
    ZeroRate,

    #[error("partition block ({0}, {1}) needs both counts non-zero")]
    InvalidBlock(u64, u64),

    #[error("port {0} is not configured")]
    UnknownPort(u16),

    #[error("port {0} already has a receiver")]
    PortInUse(u16),

    #[error("port {port} i/o failed: {source}")]
    PortIo {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("port {0} closed")]
    PortClosed(u16),

    #[error("downstream stage of segment {0} closed")]
    StageClosed(usize),

    #[error("generator failed: {0}")]
    Fatal(#[source] BoxError),

    #[error("flow task panicked: {0}")]
    TaskPanicked(String),
}
