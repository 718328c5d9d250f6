//! CAN frame abstraction.
//!
//! The bus driver is a collaborator behind
//! [`FrameSource`](crate::app::ports::FrameSource); the core only reads
//! frames and never transmits. Payloads are always carried as a full 8-byte array — unused
//! trailing bytes are zero so the bit-field decoder can treat every frame
//! uniformly.

/// One received bus frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// 11-bit or 29-bit identifier.
    pub id: u32,
    /// Payload, zero-padded to 8 bytes.
    pub data: [u8; 8],
    /// Declared data length (0–8).
    pub len: u8,
    /// Extended (29-bit) identifier flag.
    pub extended: bool,
    /// Remote transmission request flag.
    pub rtr: bool,
}

impl CanFrame {
    /// Build a data frame from an identifier and payload slice.
    /// Bytes beyond 8 are ignored; the rest of the array stays zero.
    pub fn new(id: u32, payload: &[u8]) -> Self {
        let mut data = [0u8; 8];
        let len = payload.len().min(8);
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id,
            data,
            len: len as u8,
            extended: id > 0x7FF,
            rtr: false,
        }
    }
}
