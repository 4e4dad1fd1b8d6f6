//! The BattlEye RCON wire codec: frame envelope, CRC32, and the six packet
//! body shapes (spec §4.1).
//!
//! This module is pure — no I/O, no allocation beyond the returned buffers
//! — so it can be fuzzed and property-tested directly.

mod body;
mod crc;
mod header;

pub use body::{Direction, Multipart, Packet, MAX_PACKET_SIZE};

#[cfg(test)]
pub(crate) use crc::crc32;
