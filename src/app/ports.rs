//! Port traits — the seams between the core and its collaborators.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────────┐     ┌───────────────┐
//! │ FrameSource │ ──▶ │      Controller       │ ──▶ │ TransportPort │
//! │ (bus driver)│     │  engine + protocol    │     │ (BLE/serial)  │
//! └─────────────┘     └──────┬───────────┬───┘     └───────────────┘
//!                            │           │
//!                     ┌──────▼─────┐ ┌───▼────────┐
//!                     │ StoragePort│ │ EventSink  │
//!                     │ (NVS/flash)│ │ (telemetry)│
//!                     └────────────┘ └────────────┘
//! ```
//!
//! Hardware adapters implement these on the target; tests implement them
//! with in-memory fakes. The core never names a concrete driver.

use crate::can::CanFrame;

use super::events::AppEvent;

/// Source of received bus frames.
pub trait FrameSource {
    /// Next pending frame, or `None` when the receive queue is empty.
    fn receive(&mut self) -> Option<CanFrame>;
}

/// Client-facing transport (BLE characteristic, serial link, socket).
pub trait TransportPort {
    /// Send a protocol reply or data chunk to the client.
    fn send(&mut self, data: &[u8]);

    /// Send an unsolicited status or debug update. Separate from [`send`]
    /// so adapters can route it to a notify-only channel.
    ///
    /// [`send`]: TransportPort::send
    fn send_status(&mut self, data: &[u8]) {
        self.send(data);
    }

    /// Whether a client is currently connected. Status and debug updates
    /// are suppressed while disconnected.
    fn is_connected(&self) -> bool;

    /// Largest chunk [`send`](TransportPort::send) accepts.
    fn mtu(&self) -> usize {
        128
    }
}

/// Persistent key-value storage (NVS on the target).
pub trait StoragePort {
    fn read(&mut self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError>;
    fn write(&mut self, namespace: &str, key: &str, value: &[u8]) -> Result<(), StorageError>;
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
    fn exists(&mut self, namespace: &str, key: &str) -> bool;
}

/// Storage failure modes surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
    EncryptionError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "storage I/O error"),
            Self::EncryptionError => write!(f, "storage encryption error"),
        }
    }
}

/// Sink for application lifecycle events (telemetry, host logging).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

/// No-op sink for hosts that don't consume events.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: &AppEvent) {}
}
