//! Header digest: the 128-bit tag carried in every generated payload.
//!
//! The tag is the first 16 bytes of the BLAKE3 hash of the header region.
//! It is written once by the generator and recomputed on arrival; any change
//! to the framing in between shows up as a mismatch.

use crate::packet::{Packet, PacketError};

/// Tag length in bytes. Generated payloads are exactly this long.
pub const TAG_LEN: usize = 16;

pub type HeaderTag = [u8; TAG_LEN];

/// Digest a header region.
pub fn header_tag(header: &[u8]) -> HeaderTag {
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&blake3::hash(header).as_bytes()[..TAG_LEN]);
    tag
}

/// Write the header digest into the start of the payload.
pub fn stamp(packet: &mut Packet) -> Result<HeaderTag, PacketError> {
    let regions = packet.regions()?;
    let tag = header_tag(regions.header);
    let len = regions.payload.len();
    let slot = regions
        .payload
        .get_mut(..TAG_LEN)
        .ok_or(PacketError::Truncated {
            offset: regions.header.len(),
            needed: TAG_LEN,
            len: regions.header.len() + len,
        })?;
    slot.copy_from_slice(&tag);
    Ok(tag)
}

/// Compare the stored tag against a fresh digest of the header.
///
/// A payload too short to hold a tag never matches.
pub fn verify(packet: &Packet) -> Result<bool, PacketError> {
    let header = packet.header().ok_or(PacketError::NoPayload)?;
    let payload = packet.payload().ok_or(PacketError::NoPayload)?;
    Ok(match payload.get(..TAG_LEN) {
        Some(stored) => stored == header_tag(header),
        None => false,
    })
}
