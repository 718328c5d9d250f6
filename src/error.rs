//! Unified error types for the rulebus core.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! host's error handling uniform. Load-path errors carry enough detail
//! (record index, offending value) to diagnose a rejected upload without
//! a debugger attached.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A ruleset upload was rejected.
    Load(LoadError),
    /// Persistent storage failed.
    Storage(crate::app::ports::StorageError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(e) => write!(f, "load: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Ruleset load errors
// ---------------------------------------------------------------------------

/// Why a ruleset payload was rejected.
///
/// Variants follow the validation ladder in [`crate::wire::rules`]: parse
/// errors (magic, version, declared size), integrity (CRC), bounds (any
/// offset, count or index check), and capability resolution. A rejected
/// load never mutates the live ruleset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Buffer shorter than the fixed header.
    TooShort,
    /// Magic does not identify a rules payload.
    BadMagic(u32),
    /// Version outside the supported range.
    UnsupportedVersion(u8),
    /// Declared total size exceeds the buffer or undercuts the header.
    BadTotalSize { declared: u16, buffer: usize },
    /// CRC32 over the post-header bytes does not match the header.
    CrcMismatch { declared: u32, computed: u32 },
    /// String table offset outside the valid window.
    BadStringTableOffset(u16),
    /// Declared record counts overrun the buffer or the string table.
    RecordOverflow,
    /// A condition references a signal index >= signal count.
    SignalIndexOutOfRange { condition: u8, signal: u8 },
    /// A condition carries an unrecognized operator code.
    BadOperator { condition: u8, code: u8 },
    /// A HOLD condition's duration is negative or beyond 24 h.
    BadHoldDuration { condition: u8 },
    /// An action's capability-id string is empty or unterminated.
    BadCapabilityString { action: u8 },
    /// An action parameter carries an unrecognized type code.
    BadParamType { action: u8, code: u8 },
    /// An action's parameter slice exceeds the declared parameter count.
    ParamSliceOutOfRange { action: u8 },
    /// A rule's condition mask sets a bit >= condition count.
    ConditionMaskOutOfRange { rule: u8, bit: u8 },
    /// A rule's action slice exceeds the declared action count.
    ActionSliceOutOfRange { rule: u8 },
    /// An action references a capability id with no registered handler.
    UnknownCapability(String),
}

impl LoadError {
    /// The offending id when the failure is a capability-resolution failure
    /// (reported upstream as `ERR:CAP_UNKNOWN:<id>` rather than
    /// `ERR:RULES_INVALID`).
    pub fn unknown_capability(&self) -> Option<&str> {
        match self {
            Self::UnknownCapability(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "payload shorter than header"),
            Self::BadMagic(m) => write!(f, "bad magic 0x{m:08X}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported version {v}"),
            Self::BadTotalSize { declared, buffer } => {
                write!(f, "declared size {declared} invalid for {buffer}-byte buffer")
            }
            Self::CrcMismatch { declared, computed } => write!(
                f,
                "CRC mismatch: declared 0x{declared:08X}, computed 0x{computed:08X}"
            ),
            Self::BadStringTableOffset(o) => write!(f, "bad string table offset {o}"),
            Self::RecordOverflow => write!(f, "record arrays exceed payload"),
            Self::SignalIndexOutOfRange { condition, signal } => {
                write!(f, "condition {condition} references missing signal {signal}")
            }
            Self::BadOperator { condition, code } => {
                write!(f, "condition {condition} has invalid operator {code}")
            }
            Self::BadHoldDuration { condition } => {
                write!(f, "condition {condition} has invalid hold duration")
            }
            Self::BadCapabilityString { action } => {
                write!(f, "action {action} has empty capability id")
            }
            Self::BadParamType { action, code } => {
                write!(f, "action {action} has invalid param type {code}")
            }
            Self::ParamSliceOutOfRange { action } => {
                write!(f, "action {action} param slice out of range")
            }
            Self::ConditionMaskOutOfRange { rule, bit } => {
                write!(f, "rule {rule} references missing condition {bit}")
            }
            Self::ActionSliceOutOfRange { rule } => {
                write!(f, "rule {rule} action slice out of range")
            }
            Self::UnknownCapability(id) => write!(f, "unknown capability '{id}'"),
        }
    }
}

impl From<LoadError> for Error {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

impl From<crate::app::ports::StorageError> for Error {
    fn from(e: crate::app::ports::StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
