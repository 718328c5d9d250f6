//! Rules-payload parser.
//!
//! Decodes an untrusted WBP rules blob into validated definition tables.
//! Validation is fail-closed and ordered: magic, version, declared size,
//! CRC, string-table window, record-array bounds, then per-record index and
//! range checks. Any failure rejects the whole payload — the caller's live
//! tables are never touched because parsing only ever fills scratch output.

use log::{debug, warn};

use crate::engine::types::{
    ActionDef, ConditionDef, Operator, ParamType, ParamValue, RULE_CONDITION_MASK_BITS, RuleDef,
    SignalDef,
};
use crate::error::LoadError;

use super::{
    ACTION_LEN, ACTION_PARAM_LEN, CONDITION_LEN, FLAG_HAS_META, FLAG_PERSIST, MAX_HOLD_MS,
    META_LEN, RULE_LEN, RULES_HEADER_LEN, RULES_MAGIC, SIGNAL_LEN, WBP_MIN_VERSION, WBP_VERSION,
    crc::crc32, read_f32, read_string, read_u16, read_u32,
};

/// Scratch output of a successful parse. Committed (or discarded) wholesale
/// by the loader.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRuleset {
    pub signals: Vec<SignalDef>,
    pub conditions: Vec<ConditionDef>,
    pub actions: Vec<ActionDef>,
    pub rules: Vec<RuleDef>,
    /// The uploader set the persist-requested header flag.
    pub persist_requested: bool,
}

/// Parse and validate a rules payload.
pub fn parse_rules(data: &[u8]) -> Result<ParsedRuleset, LoadError> {
    // 1–3. Header sanity: magic, version, declared size.
    if data.len() < RULES_HEADER_LEN {
        return Err(LoadError::TooShort);
    }

    let magic = read_u32(data, 0);
    if magic != RULES_MAGIC {
        warn!("WBP: invalid magic 0x{magic:08X}");
        return Err(LoadError::BadMagic(magic));
    }

    let version = data[4];
    if !(WBP_MIN_VERSION..=WBP_VERSION).contains(&version) {
        warn!("WBP: unsupported version {version}");
        return Err(LoadError::UnsupportedVersion(version));
    }

    let flags = data[5];
    let total_size = read_u16(data, 6);
    if usize::from(total_size) > data.len() || usize::from(total_size) < RULES_HEADER_LEN {
        warn!("WBP: declared size {total_size} invalid for {}-byte buffer", data.len());
        return Err(LoadError::BadTotalSize {
            declared: total_size,
            buffer: data.len(),
        });
    }
    let total = usize::from(total_size);

    let signal_count = data[8];
    let condition_count = data[9];
    let action_count = data[10];
    let rule_count = data[11];
    let action_param_count = read_u16(data, 12);
    let string_table_offset = read_u16(data, 16);
    let declared_crc = read_u32(data, 18);

    // 4. Integrity: CRC32 over every byte after the header.
    let computed_crc = crc32(&data[RULES_HEADER_LEN..total]);
    if computed_crc != declared_crc {
        warn!("WBP: CRC mismatch 0x{computed_crc:08X} != 0x{declared_crc:08X}");
        return Err(LoadError::CrcMismatch {
            declared: declared_crc,
            computed: computed_crc,
        });
    }

    // 5. String table must start after the header (+ optional meta) and
    //    before the declared end.
    let mut offset = RULES_HEADER_LEN;
    if flags & FLAG_HAS_META != 0 {
        offset += META_LEN;
    }
    let st_off = usize::from(string_table_offset);
    if st_off < offset || st_off >= total {
        return Err(LoadError::BadStringTableOffset(string_table_offset));
    }

    // 6. Record arrays must fit the buffer and end before the string table.
    let expected_end = offset
        + usize::from(signal_count) * SIGNAL_LEN
        + usize::from(condition_count) * CONDITION_LEN
        + usize::from(action_count) * ACTION_LEN
        + usize::from(action_param_count) * ACTION_PARAM_LEN
        + usize::from(rule_count) * RULE_LEN;
    if expected_end > data.len() || st_off < expected_end {
        warn!("WBP: record counts exceed buffer");
        return Err(LoadError::RecordOverflow);
    }

    let string_table = &data[st_off..total];

    // Signals.
    let mut signals = Vec::with_capacity(usize::from(signal_count));
    for _ in 0..signal_count {
        let rec = &data[offset..offset + SIGNAL_LEN];
        let sig_flags = rec[7];
        signals.push(SignalDef {
            can_id: read_u32(rec, 0),
            start_bit: read_u16(rec, 4),
            bit_length: rec[6],
            big_endian: sig_flags & 0x01 != 0,
            signed: sig_flags & 0x02 != 0,
            factor: read_f32(rec, 8),
            offset: read_f32(rec, 12),
        });
        offset += SIGNAL_LEN;
    }

    // Conditions (7–8: signal index, operator code, hold bound).
    let mut conditions = Vec::with_capacity(usize::from(condition_count));
    for i in 0..condition_count {
        let rec = &data[offset..offset + CONDITION_LEN];
        let signal_idx = rec[0];
        if signal_idx >= signal_count {
            return Err(LoadError::SignalIndexOutOfRange {
                condition: i,
                signal: signal_idx,
            });
        }

        let op_code = rec[1];
        let operator = Operator::from_code(op_code).ok_or(LoadError::BadOperator {
            condition: i,
            code: op_code,
        })?;

        let value1 = read_f32(rec, 2);
        let value2 = read_f32(rec, 6);

        let hold_ms = if operator == Operator::Hold {
            if !(0.0..=MAX_HOLD_MS).contains(&value1) {
                return Err(LoadError::BadHoldDuration { condition: i });
            }
            value1 as u32
        } else {
            0
        };

        conditions.push(ConditionDef {
            signal_idx,
            operator,
            value1,
            value2,
            hold_ms,
        });
        offset += CONDITION_LEN;
    }

    // Actions and their parameters (9–10: capability string, param slice).
    let actions_base = offset;
    offset += usize::from(action_count) * ACTION_LEN;
    let params_base = offset;
    offset += usize::from(action_param_count) * ACTION_PARAM_LEN;

    let mut actions = Vec::with_capacity(usize::from(action_count));
    for i in 0..action_count {
        let rec = &data[actions_base + usize::from(i) * ACTION_LEN..];
        let cap_str_idx = read_u16(rec, 0);
        let param_count = rec[2];
        let param_start = rec[3];

        let capability_id = read_string(string_table, cap_str_idx)
            .filter(|s| !s.is_empty())
            .ok_or(LoadError::BadCapabilityString { action: i })?
            .to_owned();

        if u16::from(param_start) + u16::from(param_count) > action_param_count {
            return Err(LoadError::ParamSliceOutOfRange { action: i });
        }

        let mut params = Vec::with_capacity(usize::from(param_count));
        for j in 0..param_count {
            let p = &data
                [params_base + (usize::from(param_start) + usize::from(j)) * ACTION_PARAM_LEN..];
            let type_code = p[0];
            let raw = read_u16(p, 1);

            let param_type = ParamType::from_code(type_code).ok_or(LoadError::BadParamType {
                action: i,
                code: type_code,
            })?;

            params.push(match param_type {
                ParamType::Int => ParamValue::Int(i32::from(raw)),
                ParamType::Bool => ParamValue::Bool(raw != 0),
                ParamType::Float => ParamValue::Float(f32::from(raw) / 100.0),
                ParamType::Str => ParamValue::Str(
                    read_string(string_table, raw)
                        .ok_or(LoadError::BadCapabilityString { action: i })?
                        .to_owned(),
                ),
            });
        }

        actions.push(ActionDef {
            capability_id,
            params,
        });
    }

    // Rules (11–12: condition mask, action slice).
    let mut rules = Vec::with_capacity(usize::from(rule_count));
    for i in 0..rule_count {
        let rec = &data[offset..offset + RULE_LEN];
        let condition_mask = read_u32(rec, 0);
        let action_start = rec[4];
        let action_count_r = rec[5];

        for bit in 0..RULE_CONDITION_MASK_BITS {
            if condition_mask & (1 << bit) != 0 && bit >= condition_count {
                return Err(LoadError::ConditionMaskOutOfRange { rule: i, bit });
            }
        }

        if u16::from(action_start) + u16::from(action_count_r) > u16::from(action_count) {
            return Err(LoadError::ActionSliceOutOfRange { rule: i });
        }

        rules.push(RuleDef {
            condition_mask,
            action_start,
            action_count: action_count_r,
            debounce_ms: u16::from(rec[6]) * 10,
            cooldown_ms: u16::from(rec[7]) * 10,
        });
        offset += RULE_LEN;
    }

    debug!(
        "WBP: parsed {} signals, {} conditions, {} actions, {} rules",
        signals.len(),
        conditions.len(),
        actions.len(),
        rules.len()
    );

    Ok(ParsedRuleset {
        signals,
        conditions,
        actions,
        rules,
        persist_requested: flags & FLAG_PERSIST != 0,
    })
}
