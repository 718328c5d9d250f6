//! Engine data model.
//!
//! Immutable definition records (decoded from a WBP payload) are kept
//! separate from the mutable runtime arenas, so a reload swaps definitions
//! wholesale and rebuilds runtime state zeroed — no embedded timers to
//! hand-reset, no carryover between ruleset generations.

use std::collections::BTreeMap;

// ───────────────────────────────────────────────────────────────
// Capacity ceilings (wire-imposed, keep as named constants)
// ───────────────────────────────────────────────────────────────

/// Width of a rule's condition mask. A rule can reference at most this many
/// distinct conditions even though table counts go up to 255.
pub const RULE_CONDITION_MASK_BITS: u8 = 32;

/// Maximum queued debug-watch updates.
pub const DEBUG_DIRTY_QUEUE_CAP: usize = 64;

/// Tolerance for float comparisons (EQ/NE/GE/LE and HOLD activity).
pub const VALUE_EPSILON: f32 = 1e-4;

// ───────────────────────────────────────────────────────────────
// Operators and parameter types
// ───────────────────────────────────────────────────────────────

/// Condition comparison operators. Discriminants are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Operator {
    Eq = 0,
    Ne = 1,
    Gt = 2,
    Ge = 3,
    Lt = 4,
    Le = 5,
    Within = 6,
    Outside = 7,
    /// Duration-gated: true once the signal has been continuously active
    /// for the hold duration.
    Hold = 8,
}

impl Operator {
    /// Decode a wire operator code.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Eq,
            1 => Self::Ne,
            2 => Self::Gt,
            3 => Self::Ge,
            4 => Self::Lt,
            5 => Self::Le,
            6 => Self::Within,
            7 => Self::Outside,
            8 => Self::Hold,
            _ => return None,
        })
    }
}

/// Action parameter value, decoded from the wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i32),
    /// Stored on the wire as integer×100.
    Float(f32),
    Str(String),
    Bool(bool),
}

// ───────────────────────────────────────────────────────────────
// Immutable definitions
// ───────────────────────────────────────────────────────────────

/// A watched bus signal: bit-field location plus linear scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDef {
    pub can_id: u32,
    pub start_bit: u16,
    pub bit_length: u8,
    pub big_endian: bool,
    pub signed: bool,
    pub factor: f32,
    pub offset: f32,
}

/// A comparison of one signal against one or two thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionDef {
    pub signal_idx: u8,
    pub operator: Operator,
    pub value1: f32,
    pub value2: f32,
    /// For [`Operator::Hold`]: required continuous-active duration in ms
    /// (reinterpreted from `value1` at parse time). Zero otherwise.
    pub hold_ms: u32,
}

/// One capability invocation with typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDef {
    pub capability_id: String,
    pub params: Vec<ParamValue>,
}

/// AND-mask over conditions, gated by debounce/cooldown, firing a
/// contiguous action slice.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDef {
    /// Bit *i* set means condition *i* must be true. An empty mask is
    /// vacuously true (always fire, subject to debounce/cooldown).
    pub condition_mask: u32,
    pub action_start: u8,
    pub action_count: u8,
    pub debounce_ms: u16,
    pub cooldown_ms: u16,
}

// ───────────────────────────────────────────────────────────────
// Runtime arenas (rebuilt zeroed on every load)
// ───────────────────────────────────────────────────────────────

/// Per-signal runtime state.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalState {
    pub value: f32,
    pub last_value: f32,
    pub last_update_ms: u32,
    /// False until the first frame carrying this signal arrives; conditions
    /// on a never-seen signal evaluate to false.
    pub ever_set: bool,
}

/// Per-condition HOLD edge-tracking state.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldState {
    pub active: bool,
    pub active_since_ms: u32,
}

/// Per-rule debounce/cooldown state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleState {
    /// `None` until the rule fires for the first time; a never-fired rule
    /// is not cooldown-gated.
    pub last_trigger_ms: Option<u32>,
    pub last_change_ms: u32,
    pub last_result: bool,
}

// ───────────────────────────────────────────────────────────────
// Capability registry types
// ───────────────────────────────────────────────────────────────

/// Parameter map passed to capability handlers, keyed `"p0"`, `"p1"`, …
/// in original parameter order.
pub type ParamMap = BTreeMap<String, String>;

/// A host-registered hardware action.
pub type CapabilityHandler = Box<dyn FnMut(&ParamMap)>;

/// Introspection metadata for one capability (profile serialization only,
/// never consulted during evaluation).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityMeta {
    pub id: String,
    pub label: String,
    pub description: String,
    pub category: String,
    pub params: Vec<CapabilityParamMeta>,
}

/// Parameter schema entry within [`CapabilityMeta`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityParamMeta {
    pub name: String,
    pub description: String,
    pub param_type: ParamType,
    pub required: bool,
    pub min: i16,
    pub max: i16,
}

/// Wire parameter type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParamType {
    Int = 0,
    Float = 1,
    Str = 2,
    Bool = 3,
}

impl ParamType {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Int,
            1 => Self::Float,
            2 => Self::Str,
            3 => Self::Bool,
            _ => return None,
        })
    }
}
