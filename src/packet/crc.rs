//! IEEE 802.3 CRC32 (the variant BattlEye's wire format uses), delegated to
//! the `crc` crate's `CRC_32_ISO_HDLC` table (reflected polynomial
//! `0xEDB88320`, init `0xFFFFFFFF`, final XOR `0xFFFFFFFF`).

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Computes the CRC32 (IEEE 802.3) of `data`.
pub(crate) fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // CRC32(IEEE) of the ASCII string "123456789" is the well known
        // check value 0xCBF43926.
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_empty() {
        assert_eq!(crc32(b""), 0x0000_0000);
    }

    proptest::proptest! {
        #[test]
        fn prop_deterministic(data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512)) {
            assert_eq!(crc32(&data), crc32(&data));
        }
    }
}
