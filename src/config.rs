//! Module configuration.
//!
//! Identity and timing knobs for the controller. The host sets these once
//! at construction; nothing in the core mutates them at runtime.

use serde::{Deserialize, Serialize};

/// Controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    // --- Identity ---
    /// Module identifier advertised to clients (e.g. "RB-3FA2C1").
    pub module_id: String,
    /// Hardware revision string.
    pub hw_version: String,
    /// Firmware version string.
    pub fw_version: String,
    /// Serial number (empty when unset).
    pub serial: String,

    // --- Timing ---
    /// Interval between status broadcasts while connected (milliseconds).
    pub status_interval_ms: u32,
    /// Minimum spacing between debug-watch updates (milliseconds).
    pub debug_tx_min_interval_ms: u32,

    // --- Limits ---
    /// Scratch buffer size for outbound profile serialization (bytes).
    pub profile_buffer_len: usize,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            module_id: String::from("RB-000000"),
            hw_version: String::from("1.0"),
            fw_version: String::from(env!("CARGO_PKG_VERSION")),
            serial: String::new(),

            status_interval_ms: 5000,
            debug_tx_min_interval_ms: 10,

            profile_buffer_len: 2048,
        }
    }
}
