//! Device-profile serializer.
//!
//! Builds the profile-direction WBP payload: module identity, uptime,
//! ruleset summary and the capability catalog, over a de-duplicating
//! NUL-packed string table. Serialization fails explicitly when the
//! destination buffer would overflow — it never truncates.

use std::collections::BTreeMap;

use crate::engine::types::CapabilityMeta;

use super::{CAP_PARAM_LEN, CAPABILITY_LEN, PROFILE_HEADER_LEN, PROFILE_MAGIC, WBP_VERSION};

/// String-table offsets saturate below this to leave terminator headroom.
const STRING_TABLE_MAX: usize = 0xFFF0;

/// Incremental string table: repeated strings reuse their first offset.
pub struct StringTableBuilder {
    strings: Vec<String>,
    offsets: BTreeMap<String, u16>,
    len: usize,
}

impl StringTableBuilder {
    pub fn new() -> Self {
        Self {
            strings: Vec::new(),
            offsets: BTreeMap::new(),
            len: 0,
        }
    }

    /// Intern `s`, returning its byte offset. `None` when the table would
    /// exceed its addressing range.
    pub fn add(&mut self, s: &str) -> Option<u16> {
        if let Some(&off) = self.offsets.get(s) {
            return Some(off);
        }
        if self.len + s.len() + 1 > STRING_TABLE_MAX {
            return None;
        }
        let off = self.len as u16;
        self.strings.push(s.to_owned());
        self.offsets.insert(s.to_owned(), off);
        self.len += s.len() + 1;
        Some(off)
    }

    /// Total packed size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Write the packed table into `dest` (which must be at least `len()`).
    pub fn write(&self, dest: &mut [u8]) {
        let mut pos = 0;
        for s in &self.strings {
            dest[pos..pos + s.len()].copy_from_slice(s.as_bytes());
            pos += s.len();
            dest[pos] = 0;
            pos += 1;
        }
    }
}

impl Default for StringTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Inputs to profile serialization beyond the capability catalog.
#[derive(Debug, Clone)]
pub struct ProfileInfo<'a> {
    pub module_id: &'a str,
    pub hw_version: &'a str,
    pub fw_version: &'a str,
    pub serial: &'a str,
    pub uptime_ms: u32,
    pub boot_count: u16,
    /// 0 = no ruleset, 1 = RAM-only, 2 = persisted.
    pub rules_mode: u8,
    pub rules_crc: u32,
    pub signal_count: u8,
    pub condition_count: u8,
    pub action_count: u8,
    pub rule_count: u8,
}

/// Serialize a profile payload into `out`.
///
/// Returns the number of bytes written, or `None` when the capability
/// catalog or string table would overflow `out`.
pub fn serialize_profile<'a>(
    out: &mut [u8],
    info: &ProfileInfo<'_>,
    capabilities: impl Iterator<Item = &'a CapabilityMeta>,
) -> Option<usize> {
    let mut table = StringTableBuilder::new();

    let module_id_idx = table.add(info.module_id)?;
    let hw_idx = table.add(info.hw_version)?;
    let fw_idx = table.add(info.fw_version)?;
    let serial_idx = table.add(info.serial)?;

    // Capability and parameter records, interning strings as we go.
    let mut cap_records: Vec<[u8; CAPABILITY_LEN]> = Vec::new();
    let mut param_records: Vec<[u8; CAP_PARAM_LEN]> = Vec::new();

    for meta in capabilities {
        let id_idx = table.add(&meta.id)?;
        let label_idx = table.add(&meta.label)?;
        let desc_idx = table.add(&meta.description)?;
        let category_idx = table.add(&meta.category)?;

        if meta.params.len() > usize::from(u8::MAX) || param_records.len() > usize::from(u8::MAX) {
            return None;
        }

        let mut rec = [0u8; CAPABILITY_LEN];
        rec[0..2].copy_from_slice(&id_idx.to_le_bytes());
        rec[2..4].copy_from_slice(&label_idx.to_le_bytes());
        rec[4..6].copy_from_slice(&desc_idx.to_le_bytes());
        rec[6..8].copy_from_slice(&category_idx.to_le_bytes());
        rec[8] = meta.params.len() as u8;
        rec[9] = param_records.len() as u8;
        cap_records.push(rec);

        for p in &meta.params {
            let name_idx = table.add(&p.name)?;
            let pdesc_idx = table.add(&p.description)?;

            let mut prec = [0u8; CAP_PARAM_LEN];
            prec[0..2].copy_from_slice(&name_idx.to_le_bytes());
            prec[2..4].copy_from_slice(&pdesc_idx.to_le_bytes());
            prec[4] = p.param_type as u8;
            prec[5] = u8::from(p.required);
            prec[6..8].copy_from_slice(&p.min.to_le_bytes());
            prec[8..10].copy_from_slice(&p.max.to_le_bytes());
            param_records.push(prec);
        }
    }

    if cap_records.len() > usize::from(u8::MAX) {
        return None;
    }

    let caps_size = cap_records.len() * CAPABILITY_LEN;
    let params_size = param_records.len() * CAP_PARAM_LEN;
    let string_table_offset = PROFILE_HEADER_LEN + caps_size + params_size;
    let total = string_table_offset + table.len();

    if total > out.len() || string_table_offset > usize::from(u16::MAX) {
        return None;
    }

    // Header.
    out[0..4].copy_from_slice(&PROFILE_MAGIC.to_le_bytes());
    out[4] = WBP_VERSION;
    out[5] = u8::from(info.rules_crc != 0);
    out[6..8].copy_from_slice(&module_id_idx.to_le_bytes());
    out[8..10].copy_from_slice(&hw_idx.to_le_bytes());
    out[10..12].copy_from_slice(&fw_idx.to_le_bytes());
    out[12..14].copy_from_slice(&serial_idx.to_le_bytes());
    out[14] = cap_records.len() as u8;
    out[15] = info.rules_mode;
    out[16..20].copy_from_slice(&info.rules_crc.to_le_bytes());
    out[20] = info.signal_count;
    out[21] = info.condition_count;
    out[22] = info.action_count;
    out[23] = info.rule_count;
    out[24..28].copy_from_slice(&info.uptime_ms.to_le_bytes());
    out[28..30].copy_from_slice(&info.boot_count.to_le_bytes());
    out[30..32].copy_from_slice(&(string_table_offset as u16).to_le_bytes());

    // Records.
    let mut pos = PROFILE_HEADER_LEN;
    for rec in &cap_records {
        out[pos..pos + CAPABILITY_LEN].copy_from_slice(rec);
        pos += CAPABILITY_LEN;
    }
    for rec in &param_records {
        out[pos..pos + CAP_PARAM_LEN].copy_from_slice(rec);
        pos += CAP_PARAM_LEN;
    }

    table.write(&mut out[pos..pos + table.len()]);

    Some(total)
}
