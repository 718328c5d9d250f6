//! WBP — the binary wire format for rulesets and device profiles.
//!
//! Rules payload layout (all integers little-endian, packed):
//! ```text
//! ┌──────────────┬───────────────┬────────────────────┬──────────────┐
//! │ Header (22B) │ Meta (40B,opt)│ Record arrays      │ String table │
//! │              │               │ sig/cond/act/param │ (NUL-packed) │
//! │              │               │ /rule, fixed-size  │              │
//! └──────────────┴───────────────┴────────────────────┴──────────────┘
//! ```
//!
//! The header declares the table cardinalities, the string-table offset and
//! a CRC32 (IEEE 802.3) over every byte after the header. [`rules`] parses
//! and validates an untrusted payload fail-closed; [`profile`] serializes
//! device metadata in the opposite direction using the same string-table
//! scheme.

pub mod crc;
pub mod profile;
pub mod rules;

/// Magic identifying a rules payload.
pub const RULES_MAGIC: u32 = 0xC0DE_5702;
/// Magic identifying a device-profile payload.
pub const PROFILE_MAGIC: u32 = 0xC0DE_5701;

/// Current wire format version.
pub const WBP_VERSION: u8 = 0x02;
/// Oldest version this parser accepts.
pub const WBP_MIN_VERSION: u8 = 0x02;

/// Header flag: an optional 40-byte metadata block follows the header.
pub const FLAG_HAS_META: u8 = 0x01;
/// Header flag: the uploader requested persistence to non-volatile storage.
pub const FLAG_PERSIST: u8 = 0x02;

/// Fixed record sizes in bytes.
pub const RULES_HEADER_LEN: usize = 22;
pub const META_LEN: usize = 40;
pub const SIGNAL_LEN: usize = 16;
pub const CONDITION_LEN: usize = 10;
pub const ACTION_LEN: usize = 4;
pub const ACTION_PARAM_LEN: usize = 3;
pub const RULE_LEN: usize = 8;

/// Upper bound on a HOLD condition's duration (24 hours in ms).
pub const MAX_HOLD_MS: f32 = 86_400_000.0;

/// Profile-direction record sizes.
pub const PROFILE_HEADER_LEN: usize = 32;
pub const CAPABILITY_LEN: usize = 10;
pub const CAP_PARAM_LEN: usize = 10;

// ── Little-endian field readers ───────────────────────────────
//
// Callers validate bounds before reading; these helpers still refuse to
// read past the slice rather than panicking.

pub(crate) fn read_u16(data: &[u8], offset: usize) -> u16 {
    let Some(b) = data.get(offset..offset + 2) else {
        return 0;
    };
    u16::from_le_bytes([b[0], b[1]])
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    let Some(b) = data.get(offset..offset + 4) else {
        return 0;
    };
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

pub(crate) fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32(data, offset))
}

/// Read a NUL-terminated string from the table at `offset`.
///
/// Returns `None` when the offset is outside the table, the run reaches the
/// table end without a terminator, or the bytes are not valid UTF-8. Never
/// reads past the table.
pub(crate) fn read_string(table: &[u8], offset: u16) -> Option<&str> {
    let start = offset as usize;
    if start >= table.len() {
        return None;
    }
    let rest = &table[start..];
    let nul = rest.iter().position(|&b| b == 0)?;
    core::str::from_utf8(&rest[..nul]).ok()
}
