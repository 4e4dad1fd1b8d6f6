//! Frame-level constants and the magic/CRC/type-byte envelope that wraps
//! every packet body (spec §4.1).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Error;
use crate::packet::crc::crc32;

pub(crate) const MAGIC: &[u8; 2] = b"BE";
pub(crate) const MARKER: u8 = 0xFF;

/// Number of bytes preceding the type-specific body: magic (2) + crc (4) +
/// marker (1) + type (1).
pub(crate) const HEADER_LEN: usize = 8;

/// The smallest frame that can possibly be valid: a header plus at least
/// one body byte (every body shape carries at least a sequence or status
/// byte).
pub(crate) const MIN_FRAME_LEN: usize = HEADER_LEN + 1;

pub(crate) const KIND_LOGIN: u8 = 0;
pub(crate) const KIND_COMMAND: u8 = 1;
pub(crate) const KIND_MESSAGE: u8 = 2;

/// A parsed, CRC-verified frame header: the packet type byte and a
/// reference to the body bytes that follow it.
pub(crate) struct ParsedHeader<'a> {
    pub(crate) kind: u8,
    pub(crate) body: &'a [u8],
}

/// Validates magic, marker, and CRC32, then returns the type byte and body
/// slice. Does not interpret the body.
pub(crate) fn parse<'a>(buf: &'a [u8]) -> Result<ParsedHeader<'a>, Error> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(Error::MalformedPacket("frame shorter than the minimum length"));
    }
    if &buf[0..2] != MAGIC {
        return Err(Error::MalformedPacket("bad magic"));
    }

    let stored_crc = (&buf[2..6])
        .read_u32::<LittleEndian>()
        .expect("length checked above");
    let computed_crc = crc32(&buf[6..]);
    if stored_crc != computed_crc {
        return Err(Error::ChecksumMismatch);
    }

    if buf[6] != MARKER {
        return Err(Error::MalformedPacket("missing 0xFF marker"));
    }

    Ok(ParsedHeader {
        kind: buf[7],
        body: &buf[HEADER_LEN..],
    })
}

/// Writes the magic/CRC/marker/type envelope around `body`, returning the
/// complete frame.
pub(crate) fn frame(kind: u8, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&[0, 0, 0, 0]); // CRC placeholder, patched below.
    buf.push(MARKER);
    buf.push(kind);
    buf.extend_from_slice(body);

    let crc = crc32(&buf[6..]);
    (&mut buf[2..6])
        .write_u32::<LittleEndian>(crc)
        .expect("buf has exactly 4 bytes reserved for the crc");
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_frame() {
        let buf = [b'B', b'E', 0, 0, 0, 0, MARKER];
        assert_eq!(
            parse(&buf).unwrap_err(),
            Error::MalformedPacket("frame shorter than the minimum length")
        );
    }

    #[test]
    fn test_rejects_bad_magic() {
        let body = [1u8];
        let mut buf = frame(KIND_LOGIN, &body);
        buf[0] = b'X';
        // CRC still matches the (now wrong) magic, so this must fail on
        // magic, not CRC.
        assert_eq!(parse(&buf).unwrap_err(), Error::MalformedPacket("bad magic"));
    }

    #[test]
    fn test_rejects_bad_crc() {
        let body = [1u8];
        let mut buf = frame(KIND_LOGIN, &body);
        buf[2] ^= 0xFF;
        assert_eq!(parse(&buf).unwrap_err(), Error::ChecksumMismatch);
    }

    #[test]
    fn test_round_trip_header() {
        let body = [9u8, 1, 2, 3];
        let buf = frame(KIND_COMMAND, &body);
        let parsed = parse(&buf).unwrap();
        assert_eq!(parsed.kind, KIND_COMMAND);
        assert_eq!(parsed.body, &body);
    }
}
