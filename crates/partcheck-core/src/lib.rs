//! partcheck-core — frame layouts, packet views, header digest and config.
//! Every other partcheck crate depends on this one.

pub mod config;
pub mod digest;
pub mod packet;
pub mod wire;

pub use digest::{HeaderTag, TAG_LEN};
pub use packet::{Packet, PacketError, Regions};
