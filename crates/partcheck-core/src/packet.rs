//! Packet buffers and bounds-checked views into them.
//!
//! A `Packet` is one frame plus, once known, the offset where the transport
//! payload starts. Everything before that offset is the header region;
//! everything from it onward is the payload region. Both are handed out as
//! plain byte slices; no pointer arithmetic leaves this module.

use bytes::{Bytes, BytesMut};
use zerocopy::byteorder::network_endian::U16;
use zerocopy::{AsBytes, FromBytes};

use crate::wire::{
    ipv4_checksum, EtherHeader, IcmpHeader, Ipv4Header, Ipv6Header, TcpHeader, UdpHeader,
    VlanTag, DEFAULT_TTL, ETHER_HDR_LEN, ETHER_TYPE_IPV4, ETHER_TYPE_IPV6, ETHER_TYPE_VLAN,
    ICMP_HDR_LEN, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP, IPV4_HDR_LEN, IPV6_HDR_LEN, MTU,
    TCP_HDR_LEN, UDP_HDR_LEN, VLAN_TAG_LEN,
};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors from building a frame or walking its framing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("payload of {0} bytes does not fit in a {} byte MTU", MTU)]
    PayloadTooLarge(usize),

    #[error("frame truncated: needed {needed} bytes at offset {offset}, frame has {len}")]
    Truncated {
        offset: usize,
        needed: usize,
        len: usize,
    },

    #[error("unsupported ether type: 0x{0:04x}")]
    UnsupportedEtherType(u16),

    #[error("ip version {0} does not match its ether type")]
    BadIpVersion(u8),

    #[error("invalid ipv4 header length: {0} bytes")]
    BadIpv4HeaderLen(usize),

    #[error("invalid tcp data offset: {0} bytes")]
    BadTcpDataOffset(usize),

    #[error("unsupported transport protocol: {0}")]
    UnsupportedProtocol(u8),

    #[error("payload offset has not been located")]
    NoPayload,
}

// ── Views ─────────────────────────────────────────────────────────────────────

/// Split view of a located packet: read-only header, writable payload.
#[derive(Debug)]
pub struct Regions<'a> {
    pub header: &'a [u8],
    pub payload: &'a mut [u8],
}

// ── Packet ────────────────────────────────────────────────────────────────────

/// One frame travelling through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    frame: BytesMut,
    data_offset: Option<usize>,
}

impl Packet {
    /// An empty buffer, ready for `init_ether_ipv4_udp`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a frame received from a port. The payload offset is unknown
    /// until `locate_transport_payload` succeeds.
    pub fn from_frame(frame: &[u8]) -> Self {
        Self {
            frame: BytesMut::from(frame),
            data_offset: None,
        }
    }

    /// Build an empty Ethernet/IPv4/UDP frame with a zeroed payload of
    /// `payload_len` bytes. Addresses and ports are left zero.
    ///
    /// Returns the payload offset.
    pub fn init_ether_ipv4_udp(&mut self, payload_len: usize) -> Result<usize, PacketError> {
        let datagram_len = IPV4_HDR_LEN + UDP_HDR_LEN + payload_len;
        if datagram_len > MTU {
            return Err(PacketError::PayloadTooLarge(payload_len));
        }
        let data_offset = ETHER_HDR_LEN + IPV4_HDR_LEN + UDP_HDR_LEN;

        self.frame.clear();
        self.frame.resize(data_offset + payload_len, 0);

        let eth = EtherHeader {
            dst: [0; 6],
            src: [0; 6],
            ether_type: U16::new(ETHER_TYPE_IPV4),
        };
        let mut ip = Ipv4Header {
            version_ihl: 0x45,
            tos: 0,
            // Bounded by MTU above.
            total_len: U16::new(datagram_len as u16),
            ident: U16::ZERO,
            flags_frag: U16::ZERO,
            ttl: DEFAULT_TTL,
            protocol: IPPROTO_UDP,
            checksum: U16::ZERO,
            src: [0; 4],
            dst: [0; 4],
        };
        ip.checksum = U16::new(ipv4_checksum(ip.as_bytes()));
        let udp = UdpHeader {
            src_port: U16::ZERO,
            dst_port: U16::ZERO,
            length: U16::new((UDP_HDR_LEN + payload_len) as u16),
            checksum: U16::ZERO,
        };

        let ip_at = ETHER_HDR_LEN;
        let udp_at = ip_at + IPV4_HDR_LEN;
        self.frame[..ip_at].copy_from_slice(eth.as_bytes());
        self.frame[ip_at..udp_at].copy_from_slice(ip.as_bytes());
        self.frame[udp_at..data_offset].copy_from_slice(udp.as_bytes());

        self.data_offset = Some(data_offset);
        Ok(data_offset)
    }

    /// Walk link, network and transport framing and record where the
    /// transport payload starts.
    ///
    /// Understands Ethernet with at most one 802.1Q tag, IPv4 (options
    /// honoured) and fixed-header IPv6, then UDP, TCP (options honoured)
    /// or ICMP. Anything else is an error and leaves the offset unset.
    pub fn locate_transport_payload(&mut self) -> Result<usize, PacketError> {
        self.data_offset = None;
        let offset = walk_framing(&self.frame)?;
        self.data_offset = Some(offset);
        Ok(offset)
    }

    /// Offset of the transport payload, if located.
    pub fn data_offset(&self) -> Option<usize> {
        self.data_offset
    }

    /// Bytes preceding the payload offset.
    pub fn header(&self) -> Option<&[u8]> {
        self.frame.get(..self.data_offset?)
    }

    /// Bytes from the payload offset to the end of the frame.
    pub fn payload(&self) -> Option<&[u8]> {
        self.frame.get(self.data_offset?..)
    }

    /// Header and payload at once, the payload writable.
    pub fn regions(&mut self) -> Result<Regions<'_>, PacketError> {
        let offset = self.data_offset.ok_or(PacketError::NoPayload)?;
        let len = self.frame.len();
        if offset > len {
            return Err(PacketError::Truncated {
                offset,
                needed: 0,
                len,
            });
        }
        let (header, payload) = self.frame.split_at_mut(offset);
        Ok(Regions { header, payload })
    }

    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Raw access to the whole frame. Writes here bypass every invariant
    /// the tag relies on; used by stages that deliberately damage traffic.
    pub fn frame_mut(&mut self) -> &mut [u8] {
        &mut self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// Hand the frame to a port.
    pub fn freeze(self) -> Bytes {
        self.frame.freeze()
    }
}

// ── Framing walk ──────────────────────────────────────────────────────────────

fn read<T: FromBytes>(frame: &[u8], offset: usize) -> Result<T, PacketError> {
    frame
        .get(offset..)
        .and_then(T::read_from_prefix)
        .ok_or(PacketError::Truncated {
            offset,
            needed: std::mem::size_of::<T>(),
            len: frame.len(),
        })
}

fn ensure(frame: &[u8], offset: usize, needed: usize) -> Result<(), PacketError> {
    if offset + needed > frame.len() {
        return Err(PacketError::Truncated {
            offset,
            needed,
            len: frame.len(),
        });
    }
    Ok(())
}

fn walk_framing(frame: &[u8]) -> Result<usize, PacketError> {
    let eth: EtherHeader = read(frame, 0)?;
    let mut offset = ETHER_HDR_LEN;
    let mut ether_type = eth.ether_type.get();

    if ether_type == ETHER_TYPE_VLAN {
        let tag: VlanTag = read(frame, offset)?;
        offset += VLAN_TAG_LEN;
        ether_type = tag.ether_type.get();
    }

    let protocol = match ether_type {
        ETHER_TYPE_IPV4 => {
            let ip: Ipv4Header = read(frame, offset)?;
            let version = ip.version_ihl >> 4;
            if version != 4 {
                return Err(PacketError::BadIpVersion(version));
            }
            let ihl = usize::from(ip.version_ihl & 0x0f) * 4;
            if ihl < IPV4_HDR_LEN {
                return Err(PacketError::BadIpv4HeaderLen(ihl));
            }
            ensure(frame, offset, ihl)?;
            offset += ihl;
            ip.protocol
        }
        ETHER_TYPE_IPV6 => {
            let ip: Ipv6Header = read(frame, offset)?;
            let version = (ip.vtc_flow.get() >> 28) as u8;
            if version != 6 {
                return Err(PacketError::BadIpVersion(version));
            }
            offset += IPV6_HDR_LEN;
            ip.next_header
        }
        other => return Err(PacketError::UnsupportedEtherType(other)),
    };

    let transport_len = match protocol {
        IPPROTO_UDP => {
            read::<UdpHeader>(frame, offset)?;
            UDP_HDR_LEN
        }
        IPPROTO_TCP => {
            let tcp: TcpHeader = read(frame, offset)?;
            let data_off = usize::from(tcp.data_off >> 4) * 4;
            if data_off < TCP_HDR_LEN {
                return Err(PacketError::BadTcpDataOffset(data_off));
            }
            ensure(frame, offset, data_off)?;
            data_off
        }
        IPPROTO_ICMP => {
            read::<IcmpHeader>(frame, offset)?;
            ICMP_HDR_LEN
        }
        other => return Err(PacketError::UnsupportedProtocol(other)),
    };

    Ok(offset + transport_len)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
