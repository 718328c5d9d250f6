//! Payload integrity checksum.
//!
//! WBP uses CRC-32/ISO-HDLC (the IEEE 802.3 polynomial, reflected), the
//! same algorithm clients use for the stream-level `<crc>` fields.

use crc::{CRC_32_ISO_HDLC, Crc};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC32 over `data`.
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
