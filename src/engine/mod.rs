//! Rule engine core.
//!
//! ```text
//! ┌──────────┐   frames    ┌─────────────┐   mask AND    ┌───────────┐
//! │ bus      │ ──────────▶ │ signal      │ ────────────▶ │ rules     │
//! │ frames   │  decode     │ states      │  conditions   │ debounce/ │
//! └──────────┘             └─────────────┘               │ cooldown  │
//!                                                        └─────┬─────┘
//!                                                              │ fire
//!                                                        ┌─────▼─────┐
//!                                                        │ capability│
//!                                                        │ registry  │
//!                                                        └───────────┘
//! ```
//!
//! Frames update per-signal state, rules AND their condition masks, and a
//! rule that passes its debounce and cooldown gates dispatches its action
//! slice through the registry. Loading is validate-then-commit: a rejected
//! payload leaves the live ruleset byte-for-byte untouched.

pub mod bitfield;
pub mod debug;
pub mod registry;
pub mod types;

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::can::CanFrame;
use crate::error::LoadError;
use crate::wire::crc::crc32;
use crate::wire::rules::parse_rules;

use bitfield::decode_signal;
use debug::{DebugSample, DebugWatch};
use registry::CapabilityRegistry;
use types::{
    ActionDef, CapabilityHandler, CapabilityMeta, ConditionDef, HoldState, Operator,
    RULE_CONDITION_MASK_BITS, RuleDef, RuleState, SignalDef, SignalState, VALUE_EPSILON,
};

/// The engine: definition tables, runtime arenas and the capability
/// registry, driven by `process_frame` / `evaluate_rules`.
pub struct RuleEngine {
    signals: Vec<SignalDef>,
    conditions: Vec<ConditionDef>,
    actions: Vec<ActionDef>,
    rules: Vec<RuleDef>,

    signal_states: Vec<SignalState>,
    hold_states: Vec<HoldState>,
    rule_states: Vec<RuleState>,

    /// CAN id → indices of signals decoded from that id.
    signal_map: HashMap<u32, Vec<usize>>,

    /// The live ruleset's exact uploaded bytes, kept for `GET:RULES`
    /// echo-back and persistence.
    raw: Vec<u8>,
    /// CRC32 over the entire raw payload (not the header-declared CRC).
    crc: u32,

    registry: CapabilityRegistry,
    /// Total rule firings since boot; survives reloads, reset by clear.
    rules_triggered: u32,
    /// First unresolved capability id from the most recent rejected load.
    unknown_capability: Option<String>,

    debug: DebugWatch,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            signals: Vec::new(),
            conditions: Vec::new(),
            actions: Vec::new(),
            rules: Vec::new(),
            signal_states: Vec::new(),
            hold_states: Vec::new(),
            rule_states: Vec::new(),
            signal_map: HashMap::new(),
            raw: Vec::new(),
            crc: 0,
            registry: CapabilityRegistry::new(),
            rules_triggered: 0,
            unknown_capability: None,
            debug: DebugWatch::new(),
        }
    }

    // ── Capability registration ───────────────────────────────

    pub fn register_capability(&mut self, id: &str, handler: CapabilityHandler) {
        self.registry.register(id, handler);
    }

    pub fn register_capability_with_meta(
        &mut self,
        id: &str,
        handler: CapabilityHandler,
        meta: CapabilityMeta,
    ) {
        self.registry.register_with_meta(id, handler, meta);
    }

    /// Registered capability metadata, id-ordered (for profile payloads).
    pub fn capabilities(&self) -> impl Iterator<Item = &CapabilityMeta> {
        self.registry.meta_entries()
    }

    // ── Loading ───────────────────────────────────────────────

    /// Validate `data` and, only on full success, swap it in as the live
    /// ruleset. On any error the previous ruleset keeps running untouched.
    ///
    /// Returns whether the uploader requested persistence.
    pub fn load_ruleset(&mut self, data: &[u8]) -> Result<bool, LoadError> {
        let parsed = parse_rules(data)?;

        // Capability resolution happens against the registry before commit;
        // the first unresolved id is retained for the status surface. A
        // parse-level rejection above leaves any earlier diagnostic intact.
        self.unknown_capability = None;
        for action in &parsed.actions {
            if !self.registry.contains(&action.capability_id) {
                warn!("ruleset rejected: unknown capability '{}'", action.capability_id);
                self.unknown_capability = Some(action.capability_id.clone());
                return Err(LoadError::UnknownCapability(action.capability_id.clone()));
            }
        }

        // Commit: definitions swap wholesale, runtime arenas rebuild zeroed.
        let mut signal_map: HashMap<u32, Vec<usize>> = HashMap::new();
        for (idx, sig) in parsed.signals.iter().enumerate() {
            signal_map.entry(sig.can_id).or_default().push(idx);
        }

        self.signal_states = vec![SignalState::default(); parsed.signals.len()];
        self.hold_states = vec![HoldState::default(); parsed.conditions.len()];
        self.rule_states = vec![RuleState::default(); parsed.rules.len()];

        self.signals = parsed.signals;
        self.conditions = parsed.conditions;
        self.actions = parsed.actions;
        self.rules = parsed.rules;
        self.signal_map = signal_map;

        self.raw = data.to_vec();
        self.crc = crc32(data);

        info!(
            "ruleset loaded: {} signals, {} conditions, {} actions, {} rules, crc 0x{:08X}",
            self.signals.len(),
            self.conditions.len(),
            self.actions.len(),
            self.rules.len(),
            self.crc
        );

        Ok(parsed.persist_requested)
    }

    /// Drop the live ruleset and all runtime state, including the trigger
    /// counter.
    pub fn clear_ruleset(&mut self) {
        self.signals.clear();
        self.conditions.clear();
        self.actions.clear();
        self.rules.clear();
        self.signal_states.clear();
        self.hold_states.clear();
        self.rule_states.clear();
        self.signal_map.clear();
        self.raw.clear();
        self.crc = 0;
        self.rules_triggered = 0;
        self.unknown_capability = None;
        info!("ruleset cleared");
    }

    // ── Frame intake and evaluation ───────────────────────────

    /// Decode every signal sourced from `frame`'s id and update its state.
    pub fn process_frame(&mut self, frame: &CanFrame, now_ms: u32) {
        if let Some(indices) = self.signal_map.get(&frame.id) {
            for &idx in indices {
                let value = decode_signal(&self.signals[idx], &frame.data);
                let state = &mut self.signal_states[idx];
                state.last_value = state.value;
                state.value = value;
                state.last_update_ms = now_ms;
                state.ever_set = true;
            }
        }
        self.debug.on_frame(frame, now_ms);
    }

    /// Evaluate every rule against current signal state. Returns how many
    /// rules fired this pass.
    pub fn evaluate_rules(&mut self, now_ms: u32) -> u32 {
        let mut fired = 0u32;
        let mask_bits = RULE_CONDITION_MASK_BITS.min(
            u8::try_from(self.conditions.len()).unwrap_or(RULE_CONDITION_MASK_BITS),
        );

        for (rule_idx, rule) in self.rules.iter().enumerate() {
            // AND over the mask; an empty mask is vacuously true.
            let mut result = true;
            for bit in 0..mask_bits {
                if rule.condition_mask & (1 << bit) == 0 {
                    continue;
                }
                let idx = usize::from(bit);
                if !evaluate_condition(
                    &self.conditions[idx],
                    &mut self.hold_states[idx],
                    &self.signal_states,
                    now_ms,
                ) {
                    result = false;
                    break;
                }
            }

            let state = &mut self.rule_states[rule_idx];
            if result != state.last_result {
                state.last_result = result;
                state.last_change_ms = now_ms;
            }
            if !result {
                continue;
            }

            // Debounce: the result must have held steady long enough.
            if now_ms.wrapping_sub(state.last_change_ms) < u32::from(rule.debounce_ms) {
                continue;
            }
            // Cooldown: a never-fired rule is not gated.
            if let Some(last) = state.last_trigger_ms {
                if now_ms.wrapping_sub(last) < u32::from(rule.cooldown_ms) {
                    continue;
                }
            }

            state.last_trigger_ms = Some(now_ms);
            fired += 1;
            self.rules_triggered = self.rules_triggered.wrapping_add(1);
            debug!("rule {rule_idx} fired at t={now_ms}");

            let start = usize::from(rule.action_start);
            let end = (start + usize::from(rule.action_count)).min(self.actions.len());
            for action in &self.actions[start..end] {
                self.registry.dispatch(action);
            }
        }

        fired
    }

    // ── Introspection ─────────────────────────────────────────

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Distinct CAN ids the live ruleset watches.
    pub fn unique_can_ids(&self) -> usize {
        self.signal_map.len()
    }

    pub fn has_ruleset(&self) -> bool {
        !self.raw.is_empty()
    }

    /// Exact bytes of the live ruleset (empty when none is loaded).
    pub fn ruleset_binary(&self) -> &[u8] {
        &self.raw
    }

    /// CRC32 over the entire live payload; zero when none is loaded.
    pub fn ruleset_crc(&self) -> u32 {
        self.crc
    }

    pub fn rules_triggered(&self) -> u32 {
        self.rules_triggered
    }

    /// First unresolved capability id from the last rejected load, if any.
    pub fn unknown_capability(&self) -> Option<&str> {
        self.unknown_capability.as_deref()
    }

    // ── Debug watch passthrough ───────────────────────────────

    pub fn debug_watch_load(&mut self, definitions: &str) -> usize {
        self.debug.load_definitions(definitions)
    }

    pub fn debug_watch_start(&mut self) {
        self.debug.set_enabled(true);
    }

    pub fn debug_watch_stop(&mut self) {
        self.debug.clear();
    }

    pub fn debug_watch_enabled(&self) -> bool {
        self.debug.is_enabled()
    }

    pub fn debug_pop_dirty(&mut self) -> Option<DebugSample> {
        self.debug.pop_dirty()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate one condition against current signal state.
///
/// A condition on an out-of-range or never-updated signal is false. HOLD
/// tracks activity edges in `hold`: it turns true only once the signal has
/// been continuously non-zero for the hold duration, and resets instantly
/// when the signal goes inactive.
pub fn evaluate_condition(
    cond: &ConditionDef,
    hold: &mut HoldState,
    signals: &[SignalState],
    now_ms: u32,
) -> bool {
    let Some(state) = signals.get(usize::from(cond.signal_idx)) else {
        return false;
    };
    if !state.ever_set {
        return false;
    }
    let val = state.value;
    let v1 = cond.value1;
    let v2 = cond.value2;

    match cond.operator {
        Operator::Eq => (val - v1).abs() < VALUE_EPSILON,
        Operator::Ne => (val - v1).abs() >= VALUE_EPSILON,
        Operator::Gt => val > v1,
        Operator::Ge => val >= v1 - VALUE_EPSILON,
        Operator::Lt => val < v1,
        Operator::Le => val <= v1 + VALUE_EPSILON,
        Operator::Within => val >= v1 && val <= v2,
        Operator::Outside => val < v1 || val > v2,
        Operator::Hold => {
            let active = val.abs() > VALUE_EPSILON;
            if active && !hold.active {
                hold.active = true;
                hold.active_since_ms = now_ms;
            } else if !active {
                hold.active = false;
            }
            hold.active && now_ms.wrapping_sub(hold.active_since_ms) >= cond.hold_ms
        }
    }
}
