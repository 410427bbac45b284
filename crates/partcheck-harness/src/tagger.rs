//! Generator side: build each outgoing packet and stamp its header tag.

use std::sync::Arc;

use partcheck_core::{digest, HeaderTag, Packet, PacketError, TAG_LEN};

use crate::stats::Counters;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("failed to build Ethernet/IPv4/UDP frame: {0}")]
    Construct(#[source] PacketError),

    #[error("failed to stamp header tag: {0}")]
    Stamp(#[source] PacketError),
}

/// Builds Ethernet/IPv4/UDP packets whose payload is exactly one header tag.
#[derive(Debug, Clone)]
pub struct Tagger {
    counters: Arc<Counters>,
}

impl Tagger {
    pub fn new(counters: Arc<Counters>) -> Self {
        Self { counters }
    }

    /// Fill an empty packet and stamp it. A construction failure is fatal to
    /// the run and leaves the sent counter untouched. A tag always fits in
    /// the MTU, so `Construct` only surfaces if the frame builder changes.
    pub fn generate(&self, pkt: &mut Packet) -> Result<HeaderTag, GenerateError> {
        pkt.init_ether_ipv4_udp(TAG_LEN)
            .map_err(GenerateError::Construct)?;
        self.tag(pkt)
    }

    /// Stamp an already-built packet. Counts the packet as sent whether or
    /// not the stamp succeeded.
    pub fn tag(&self, pkt: &mut Packet) -> Result<HeaderTag, GenerateError> {
        let stamped = digest::stamp(pkt);
        self.counters.record_sent();
        stamped.map_err(GenerateError::Stamp)
    }
}
