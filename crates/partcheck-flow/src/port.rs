//! Ports: where frames enter and leave a flow graph.
//!
//! Two backends:
//!   Udp:    one loopback UDP socket per port, shared by rx and tx, so two
//!            processes can be wired together without a NIC.
//!   Memory: a pair of in-process NICs cross-connected by bounded channels.
//!            Lossless and backpressured; used to run both halves of the
//!            test inside one process.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use partcheck_core::config::PortLink;
use partcheck_core::wire::MAX_FRAME_LEN;

use crate::error::FlowError;

/// Default depth of every in-process queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 4096;

/// The set of ports a flow graph can receive from and send to.
pub enum Ports {
    Udp(UdpPorts),
    Memory(MemoryNic),
}

impl From<UdpPorts> for Ports {
    fn from(p: UdpPorts) -> Self {
        Ports::Udp(p)
    }
}

impl From<MemoryNic> for Ports {
    fn from(p: MemoryNic) -> Self {
        Ports::Memory(p)
    }
}

impl Ports {
    pub(crate) async fn open_rx(&self, port: u16) -> Result<PortRx, FlowError> {
        match self {
            Ports::Udp(udp) => {
                let (socket, _) = udp.socket(port).await?;
                Ok(PortRx::Udp {
                    port,
                    socket,
                    buf: vec![0u8; MAX_FRAME_LEN],
                })
            }
            Ports::Memory(nic) => Ok(PortRx::Memory {
                port,
                rx: nic.take_rx(port)?,
            }),
        }
    }

    pub(crate) async fn open_tx(&self, port: u16) -> Result<PortTx, FlowError> {
        match self {
            Ports::Udp(udp) => {
                let (socket, peer) = udp.socket(port).await?;
                Ok(PortTx::Udp { port, socket, peer })
            }
            Ports::Memory(nic) => Ok(PortTx::Memory {
                port,
                tx: nic.peer_tx(port),
            }),
        }
    }
}

// ── UDP ───────────────────────────────────────────────────────────────────────

pub struct UdpPorts {
    links: HashMap<u16, PortLink>,
    sockets: DashMap<u16, Arc<UdpSocket>>,
}

impl UdpPorts {
    pub fn new(links: impl IntoIterator<Item = PortLink>) -> Self {
        Self {
            links: links.into_iter().map(|l| (l.port, l)).collect(),
            sockets: DashMap::new(),
        }
    }

    /// Socket for `port`, bound on first use, plus the address tx goes to.
    async fn socket(&self, port: u16) -> Result<(Arc<UdpSocket>, SocketAddr), FlowError> {
        let link = self.links.get(&port).ok_or(FlowError::UnknownPort(port))?;
        if let Some(socket) = self.sockets.get(&port) {
            return Ok((socket.clone(), link.peer));
        }

        let socket = UdpSocket::bind(link.bind)
            .await
            .map_err(|source| FlowError::PortIo { port, source })?;
        let socket = Arc::new(socket);
        tracing::info!(port, bind = %link.bind, peer = %link.peer, "udp port bound");
        self.sockets.insert(port, socket.clone());
        Ok((socket, link.peer))
    }
}

/// An ICMP port-unreachable from a peer that is not up yet surfaces on the
/// shared socket as one of these. They are loss, not failure.
fn is_peer_unreachable(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
    )
}

// ── Memory ────────────────────────────────────────────────────────────────────

struct Queue {
    tx: mpsc::Sender<Bytes>,
    rx: Option<mpsc::Receiver<Bytes>>,
}

impl Queue {
    fn new(depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth);
        Self { tx, rx: Some(rx) }
    }
}

/// One side of an in-process wire. Frames sent on port N arrive on the
/// peer NIC's port N.
#[derive(Clone)]
pub struct MemoryNic {
    local: Arc<DashMap<u16, Queue>>,
    remote: Arc<DashMap<u16, Queue>>,
    depth: usize,
}

impl MemoryNic {
    /// Two NICs wired back to back.
    pub fn pair() -> (MemoryNic, MemoryNic) {
        Self::pair_with_depth(DEFAULT_QUEUE_DEPTH)
    }

    pub fn pair_with_depth(depth: usize) -> (MemoryNic, MemoryNic) {
        let a = Arc::new(DashMap::new());
        let b = Arc::new(DashMap::new());
        (
            MemoryNic {
                local: a.clone(),
                remote: b.clone(),
                depth,
            },
            MemoryNic {
                local: b,
                remote: a,
                depth,
            },
        )
    }

    fn take_rx(&self, port: u16) -> Result<mpsc::Receiver<Bytes>, FlowError> {
        self.local
            .entry(port)
            .or_insert_with(|| Queue::new(self.depth))
            .rx
            .take()
            .ok_or(FlowError::PortInUse(port))
    }

    fn peer_tx(&self, port: u16) -> mpsc::Sender<Bytes> {
        self.remote
            .entry(port)
            .or_insert_with(|| Queue::new(self.depth))
            .tx
            .clone()
    }
}

// ── Endpoints ─────────────────────────────────────────────────────────────────

pub(crate) enum PortRx {
    Udp {
        port: u16,
        socket: Arc<UdpSocket>,
        buf: Vec<u8>,
    },
    Memory {
        port: u16,
        rx: mpsc::Receiver<Bytes>,
    },
}

impl PortRx {
    pub(crate) async fn recv(&mut self) -> Result<Bytes, FlowError> {
        match self {
            PortRx::Udp { port, socket, buf } => loop {
                match socket.recv_from(buf).await {
                    Ok((len, _from)) => return Ok(Bytes::copy_from_slice(&buf[..len])),
                    Err(e) if is_peer_unreachable(&e) => {
                        tracing::trace!(port = *port, error = %e, "peer unreachable, still listening");
                    }
                    Err(source) => return Err(FlowError::PortIo { port: *port, source }),
                }
            },
            PortRx::Memory { port, rx } => rx.recv().await.ok_or(FlowError::PortClosed(*port)),
        }
    }
}

pub(crate) enum PortTx {
    Udp {
        port: u16,
        socket: Arc<UdpSocket>,
        peer: SocketAddr,
    },
    Memory {
        port: u16,
        tx: mpsc::Sender<Bytes>,
    },
}

impl PortTx {
    /// Send one frame. UDP send failures are dropped frames, never errors.
    pub(crate) async fn send(&self, frame: Bytes) -> Result<(), FlowError> {
        match self {
            PortTx::Udp { port, socket, peer } => {
                if let Err(e) = socket.send_to(&frame, *peer).await {
                    if is_peer_unreachable(&e) {
                        tracing::trace!(port = *port, %peer, "peer unreachable, frame dropped");
                    } else {
                        tracing::debug!(port = *port, %peer, error = %e, "udp send failed, frame dropped");
                    }
                }
                Ok(())
            }
            PortTx::Memory { port, tx } => tx
                .send(frame)
                .await
                .map_err(|_| FlowError::PortClosed(*port)),
        }
    }
}
