//! Shared test helpers: a builder that assembles valid rules payloads
//! byte-by-byte, so individual tests can corrupt specific fields.

// Each test binary uses a different subset of the builder.
#![allow(dead_code)]

use rulebus::wire::crc::crc32;
use rulebus::wire::{
    ACTION_LEN, ACTION_PARAM_LEN, CONDITION_LEN, FLAG_PERSIST, RULE_LEN, RULES_HEADER_LEN,
    RULES_MAGIC, SIGNAL_LEN, WBP_VERSION,
};

pub struct SignalSpec {
    pub can_id: u32,
    pub start_bit: u16,
    pub bit_length: u8,
    pub big_endian: bool,
    pub signed: bool,
    pub factor: f32,
    pub offset: f32,
}

pub struct ConditionSpec {
    pub signal_idx: u8,
    pub op: u8,
    pub value1: f32,
    pub value2: f32,
}

pub struct ActionSpec {
    pub capability_id: String,
    /// `(type_code, raw_value)` pairs.
    pub params: Vec<(u8, u16)>,
}

pub struct RuleSpec {
    pub condition_mask: u32,
    pub action_start: u8,
    pub action_count: u8,
    pub debounce_ds: u8,
    pub cooldown_ds: u8,
}

#[derive(Default)]
pub struct RulesetBuilder {
    signals: Vec<SignalSpec>,
    conditions: Vec<ConditionSpec>,
    actions: Vec<ActionSpec>,
    rules: Vec<RuleSpec>,
    persist: bool,
}

impl RulesetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(mut self, can_id: u32, start_bit: u16, bit_length: u8, factor: f32, offset: f32) -> Self {
        self.signals.push(SignalSpec {
            can_id,
            start_bit,
            bit_length,
            big_endian: false,
            signed: false,
            factor,
            offset,
        });
        self
    }

    pub fn condition(mut self, signal_idx: u8, op: u8, value1: f32, value2: f32) -> Self {
        self.conditions.push(ConditionSpec { signal_idx, op, value1, value2 });
        self
    }

    pub fn action(mut self, capability_id: &str, params: &[(u8, u16)]) -> Self {
        self.actions.push(ActionSpec {
            capability_id: capability_id.to_owned(),
            params: params.to_vec(),
        });
        self
    }

    pub fn rule(mut self, condition_mask: u32, debounce_ds: u8, cooldown_ds: u8) -> Self {
        self.rules.push(RuleSpec {
            condition_mask,
            action_start: 0,
            action_count: self.actions.len() as u8,
            debounce_ds,
            cooldown_ds,
        });
        self
    }

    pub fn rule_slice(mut self, condition_mask: u32, action_start: u8, action_count: u8) -> Self {
        self.rules.push(RuleSpec {
            condition_mask,
            action_start,
            action_count,
            debounce_ds: 0,
            cooldown_ds: 0,
        });
        self
    }

    pub fn persist(mut self) -> Self {
        self.persist = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        // String table: intern each capability id once.
        let mut table: Vec<u8> = Vec::new();
        let mut offsets: Vec<u16> = Vec::new();
        for a in &self.actions {
            let existing = self
                .actions
                .iter()
                .take_while(|b| !std::ptr::eq(*b, a))
                .position(|b| b.capability_id == a.capability_id);
            if let Some(i) = existing {
                offsets.push(offsets[i]);
            } else {
                offsets.push(table.len() as u16);
                table.extend_from_slice(a.capability_id.as_bytes());
                table.push(0);
            }
        }
        if table.is_empty() {
            table.push(0); // keep the table non-empty so st_off < total
        }

        let param_total: usize = self.actions.iter().map(|a| a.params.len()).sum();
        let st_off = RULES_HEADER_LEN
            + self.signals.len() * SIGNAL_LEN
            + self.conditions.len() * CONDITION_LEN
            + self.actions.len() * ACTION_LEN
            + param_total * ACTION_PARAM_LEN
            + self.rules.len() * RULE_LEN;
        let total = st_off + table.len();

        let mut buf = vec![0u8; total];
        buf[0..4].copy_from_slice(&RULES_MAGIC.to_le_bytes());
        buf[4] = WBP_VERSION;
        buf[5] = if self.persist { FLAG_PERSIST } else { 0 };
        buf[6..8].copy_from_slice(&(total as u16).to_le_bytes());
        buf[8] = self.signals.len() as u8;
        buf[9] = self.conditions.len() as u8;
        buf[10] = self.actions.len() as u8;
        buf[11] = self.rules.len() as u8;
        buf[12..14].copy_from_slice(&(param_total as u16).to_le_bytes());
        buf[16..18].copy_from_slice(&(st_off as u16).to_le_bytes());

        let mut pos = RULES_HEADER_LEN;
        for s in &self.signals {
            buf[pos..pos + 4].copy_from_slice(&s.can_id.to_le_bytes());
            buf[pos + 4..pos + 6].copy_from_slice(&s.start_bit.to_le_bytes());
            buf[pos + 6] = s.bit_length;
            buf[pos + 7] = u8::from(s.big_endian) | (u8::from(s.signed) << 1);
            buf[pos + 8..pos + 12].copy_from_slice(&s.factor.to_le_bytes());
            buf[pos + 12..pos + 16].copy_from_slice(&s.offset.to_le_bytes());
            pos += SIGNAL_LEN;
        }
        for c in &self.conditions {
            buf[pos] = c.signal_idx;
            buf[pos + 1] = c.op;
            buf[pos + 2..pos + 6].copy_from_slice(&c.value1.to_le_bytes());
            buf[pos + 6..pos + 10].copy_from_slice(&c.value2.to_le_bytes());
            pos += CONDITION_LEN;
        }
        let mut param_start = 0u8;
        for (a, &str_off) in self.actions.iter().zip(&offsets) {
            buf[pos..pos + 2].copy_from_slice(&str_off.to_le_bytes());
            buf[pos + 2] = a.params.len() as u8;
            buf[pos + 3] = param_start;
            param_start += a.params.len() as u8;
            pos += ACTION_LEN;
        }
        for a in &self.actions {
            for &(ty, raw) in &a.params {
                buf[pos] = ty;
                buf[pos + 1..pos + 3].copy_from_slice(&raw.to_le_bytes());
                pos += ACTION_PARAM_LEN;
            }
        }
        for r in &self.rules {
            buf[pos..pos + 4].copy_from_slice(&r.condition_mask.to_le_bytes());
            buf[pos + 4] = r.action_start;
            buf[pos + 5] = r.action_count;
            buf[pos + 6] = r.debounce_ds;
            buf[pos + 7] = r.cooldown_ds;
            pos += RULE_LEN;
        }
        buf[pos..pos + table.len()].copy_from_slice(&table);

        let crc = crc32(&buf[RULES_HEADER_LEN..]);
        buf[18..22].copy_from_slice(&crc.to_le_bytes());
        buf
    }
}

/// One signal (id 0x100, bits 0..16, raw value), one GT-50 condition, one
/// parameterless action on `cap`, one rule over condition 0.
pub fn simple_ruleset(cap: &str) -> Vec<u8> {
    RulesetBuilder::new()
        .signal(0x100, 0, 16, 1.0, 0.0)
        .condition(0, 2, 50.0, 0.0) // GT
        .action(cap, &[])
        .rule(0b1, 0, 0)
        .build()
}
