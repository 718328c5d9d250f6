//! Debug signal watch.
//!
//! Ad-hoc signals a connected client asks to observe live, independent of
//! the loaded ruleset. Definitions arrive as comma-separated
//! `canId:startBit:bitLen:bigEndian:factor:offset` specs; decoded values
//! are change-detected and queued for the service to drain, one per debug
//! tick.

use std::collections::HashMap;
use std::collections::VecDeque;

use crate::can::CanFrame;

use super::bitfield::decode_signal;
use super::types::{DEBUG_DIRTY_QUEUE_CAP, SignalDef, SignalState};

/// Change threshold below which an update is not reported.
const REPORT_DELTA: f32 = 0.01;

/// A decoded watch-signal update ready to send to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugSample {
    pub def: SignalDef,
    pub value: f32,
}

/// Live watch state. Cleared on `DEBUG:STOP` and on disconnect.
pub struct DebugWatch {
    enabled: bool,
    signals: Vec<SignalDef>,
    states: Vec<SignalState>,
    /// Last value reported to the client per signal.
    reported: Vec<Option<f32>>,
    map: HashMap<u32, Vec<usize>>,
    dirty: Vec<bool>,
    queue: VecDeque<usize>,
}

impl DebugWatch {
    pub fn new() -> Self {
        Self {
            enabled: false,
            signals: Vec::new(),
            states: Vec::new(),
            reported: Vec::new(),
            map: HashMap::new(),
            dirty: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Replace the watch set from a definition string. Malformed entries
    /// are skipped. Returns the number of signals accepted and enables
    /// watching.
    pub fn load_definitions(&mut self, definitions: &str) -> usize {
        let mut signals = Vec::new();
        let mut map: HashMap<u32, Vec<usize>> = HashMap::new();

        for def in definitions.split(',') {
            let def = def.trim();
            if def.is_empty() {
                continue;
            }
            let Some(sig) = parse_definition(def) else {
                continue;
            };
            map.entry(sig.can_id).or_default().push(signals.len());
            signals.push(sig);
        }

        let count = signals.len();
        self.states = vec![SignalState::default(); count];
        self.reported = vec![None; count];
        self.dirty = vec![false; count];
        self.queue.clear();
        self.signals = signals;
        self.map = map;
        self.enabled = true;
        count
    }

    /// Drop all watch signals and disable watching.
    pub fn clear(&mut self) {
        self.signals.clear();
        self.states.clear();
        self.reported.clear();
        self.map.clear();
        self.dirty.clear();
        self.queue.clear();
        self.enabled = false;
    }

    /// Fold a frame into the watch set, queueing changed signals.
    pub fn on_frame(&mut self, frame: &CanFrame, now_ms: u32) {
        if !self.enabled {
            return;
        }
        let Some(indices) = self.map.get(&frame.id) else {
            return;
        };
        for &idx in indices {
            let value = decode_signal(&self.signals[idx], &frame.data);
            let state = &mut self.states[idx];
            state.last_value = state.value;
            state.value = value;
            state.last_update_ms = now_ms;
            state.ever_set = true;

            let changed = match self.reported[idx] {
                None => true,
                Some(prev) => (value - prev).abs() > REPORT_DELTA,
            };
            if changed && !self.dirty[idx] && self.queue.len() < DEBUG_DIRTY_QUEUE_CAP {
                self.dirty[idx] = true;
                self.queue.push_back(idx);
            }
        }
    }

    /// Take the next changed signal, marking its value as reported.
    pub fn pop_dirty(&mut self) -> Option<DebugSample> {
        let idx = self.queue.pop_front()?;
        self.dirty[idx] = false;
        let value = self.states[idx].value;
        self.reported[idx] = Some(value);
        Some(DebugSample {
            def: self.signals[idx].clone(),
            value,
        })
    }

    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }
}

impl Default for DebugWatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one `canId:startBit:bitLen:bigEndian:factor:offset` spec.
fn parse_definition(def: &str) -> Option<SignalDef> {
    let mut parts = def.split(':');
    let can_id = parts.next()?.trim().parse::<u32>().ok()?;
    let start_bit = parts.next()?.trim().parse::<u16>().ok()?;
    let bit_length = parts.next()?.trim().parse::<u8>().ok()?;
    let big_endian = parts.next()?.trim().parse::<u8>().ok()? != 0;
    let factor = parts.next()?.trim().parse::<f32>().ok()?;
    let offset = parts.next()?.trim().parse::<f32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(SignalDef {
        can_id,
        start_bit,
        bit_length,
        big_endian,
        signed: false,
        factor,
        offset,
    })
}
