//! Frame layouts: on-wire header types for the synthetic test traffic.
//!
//! The harness itself treats headers as an opaque byte region. These types
//! exist so the generator can build a well-formed Ethernet/IPv4/UDP frame and
//! the receive side can walk the framing up to the transport payload.
//!
//! All types are #[repr(C, packed)] with network-order fields and use
//! zerocopy derives for allocation-free reads and writes. There is no unsafe
//! code in this module.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::network_endian::{U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Link layer ───────────────────────────────────────────────────────────────

/// Ethernet II header without preamble or FCS.
///
/// Wire size: 14 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct EtherHeader {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub ether_type: U16,
}

assert_eq_size!(EtherHeader, [u8; 14]);

/// Single 802.1Q tag, sitting between the MAC addresses and the real ether type.
///
/// Wire size: 4 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct VlanTag {
    pub tci: U16,
    pub ether_type: U16,
}

assert_eq_size!(VlanTag, [u8; 4]);

// ── Network layer ────────────────────────────────────────────────────────────

/// IPv4 header, fixed part. Options (IHL > 5) follow it in the frame.
///
/// Wire size: 20 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct Ipv4Header {
    /// High nibble: version (4). Low nibble: header length in 32-bit words.
    pub version_ihl: u8,
    pub tos: u8,
    pub total_len: U16,
    pub ident: U16,
    pub flags_frag: U16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: U16,
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

assert_eq_size!(Ipv4Header, [u8; 20]);

/// IPv6 fixed header. Extension headers are not walked.
///
/// Wire size: 40 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct Ipv6Header {
    /// Version (4 bits), traffic class (8 bits), flow label (20 bits).
    pub vtc_flow: U32,
    pub payload_len: U16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

assert_eq_size!(Ipv6Header, [u8; 40]);

// ── Transport layer ──────────────────────────────────────────────────────────

/// Wire size: 8 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct UdpHeader {
    pub src_port: U16,
    pub dst_port: U16,
    /// Header plus payload, in bytes.
    pub length: U16,
    /// Zero means "not computed" for IPv4.
    pub checksum: U16,
}

assert_eq_size!(UdpHeader, [u8; 8]);

/// TCP header, fixed part. Options follow up to the data offset.
///
/// Wire size: 20 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct TcpHeader {
    pub src_port: U16,
    pub dst_port: U16,
    pub seq: U32,
    pub ack: U32,
    /// High nibble: data offset in 32-bit words.
    pub data_off: u8,
    pub flags: u8,
    pub window: U16,
    pub checksum: U16,
    pub urgent: U16,
}

assert_eq_size!(TcpHeader, [u8; 20]);

/// ICMP echo-style header.
///
/// Wire size: 8 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: U16,
    pub ident: U16,
    pub seq: U16,
}

assert_eq_size!(IcmpHeader, [u8; 8]);

// ── Constants ─────────────────────────────────────────────────────────────────

pub const ETHER_TYPE_IPV4: u16 = 0x0800;
pub const ETHER_TYPE_IPV6: u16 = 0x86dd;
pub const ETHER_TYPE_VLAN: u16 = 0x8100;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

pub const ETHER_HDR_LEN: usize = std::mem::size_of::<EtherHeader>();
pub const VLAN_TAG_LEN: usize = std::mem::size_of::<VlanTag>();
pub const IPV4_HDR_LEN: usize = std::mem::size_of::<Ipv4Header>();
pub const IPV6_HDR_LEN: usize = std::mem::size_of::<Ipv6Header>();
pub const UDP_HDR_LEN: usize = std::mem::size_of::<UdpHeader>();
pub const TCP_HDR_LEN: usize = std::mem::size_of::<TcpHeader>();
pub const ICMP_HDR_LEN: usize = std::mem::size_of::<IcmpHeader>();

/// Largest L3 datagram the generator will build.
pub const MTU: usize = 1500;

/// Largest frame any port will carry (MTU + Ethernet + one VLAN tag).
pub const MAX_FRAME_LEN: usize = MTU + ETHER_HDR_LEN + VLAN_TAG_LEN;

/// Default TTL stamped on generated datagrams.
pub const DEFAULT_TTL: u8 = 64;

/// RFC 1071 one's-complement checksum over an IPv4 header.
///
/// The checksum field must be zero in `header` when computing a fresh value.
/// Computing over a header that carries a correct checksum yields zero.
pub fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = header.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u32::from(*last) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lengths_match_wire_sizes() {
        assert_eq!(ETHER_HDR_LEN, 14);
        assert_eq!(VLAN_TAG_LEN, 4);
        assert_eq!(IPV4_HDR_LEN, 20);
        assert_eq!(IPV6_HDR_LEN, 40);
        assert_eq!(UDP_HDR_LEN, 8);
        assert_eq!(TCP_HDR_LEN, 20);
        assert_eq!(ICMP_HDR_LEN, 8);
    }

    #[test]
    fn ether_header_is_network_order() {
        let eth = EtherHeader {
            dst: [0xff; 6],
            src: [0x02; 6],
            ether_type: U16::new(ETHER_TYPE_IPV4),
        };
        let bytes = eth.as_bytes();
        assert_eq!(&bytes[12..14], &[0x08, 0x00]);

        let back = EtherHeader::read_from_prefix(bytes).unwrap();
        assert_eq!(back.ether_type.get(), ETHER_TYPE_IPV4);
        assert_eq!(back.src, [0x02; 6]);
    }

    #[test]
    fn ipv4_checksum_known_vector() {
        // Classic example header with a zeroed checksum field.
        let header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(ipv4_checksum(&header), 0xb861);
    }

    #[test]
    fn ipv4_checksum_verifies_to_zero() {
        let mut header = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        let sum = ipv4_checksum(&header);
        header[10..12].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(ipv4_checksum(&header), 0);
    }
}
