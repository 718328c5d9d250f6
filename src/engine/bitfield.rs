//! Bit-field extraction and signal decoding.
//!
//! Pulls an arbitrary-width integer out of an 8-byte frame payload in
//! either bit convention, then applies sign extension and linear scaling.
//! Out-of-range bit positions are skipped (contribute zero) rather than
//! failing — a malformed definition degrades to a zero value, never a read
//! past the payload.

use super::types::SignalDef;

/// Extract `len` bits from `data` starting at absolute bit `start`.
///
/// * Little/standard order: result bit *i* comes from payload bit
///   `start + i` (LSB-first within each byte).
/// * Big/reversed order: result bit *i* comes from payload bit `start - i`,
///   accumulated MSB-first.
///
/// `len == 0` or `len > 64` yields 0.
pub fn extract_bits(data: &[u8; 8], start: u16, len: u8, big_endian: bool) -> u64 {
    if len == 0 || len > 64 {
        return 0;
    }

    let mut result: u64 = 0;

    if !big_endian {
        for i in 0..len {
            // u32 so start_bit near u16::MAX cannot overflow the sum.
            let bit_pos = u32::from(start) + u32::from(i);
            if bit_pos >= 64 {
                continue;
            }
            let byte_idx = (bit_pos / 8) as usize;
            let bit_idx = bit_pos % 8;
            let bit = u64::from((data[byte_idx] >> bit_idx) & 1);
            result |= bit << i;
        }
    } else {
        for i in 0..len {
            let bit_pos = i32::from(start) - i32::from(i);
            if !(0..64).contains(&bit_pos) {
                continue;
            }
            let byte_idx = (bit_pos / 8) as usize;
            let bit_idx = bit_pos % 8;
            let bit = u64::from((data[byte_idx] >> bit_idx) & 1);
            result = (result << 1) | bit;
        }
    }

    result
}

/// Decode a signal's physical value from a frame payload:
/// `raw * factor + offset`, sign-extended first when the signal is signed.
pub fn decode_signal(def: &SignalDef, data: &[u8; 8]) -> f32 {
    let mut raw = extract_bits(data, def.start_bit, def.bit_length, def.big_endian);

    let val = if def.signed {
        if def.bit_length > 0 && def.bit_length < 64 && raw & (1u64 << (def.bit_length - 1)) != 0 {
            raw |= !0u64 << def.bit_length;
        }
        raw as i64 as f32
    } else {
        raw as f32
    };

    val * def.factor + def.offset
}
