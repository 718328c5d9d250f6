//! Text command protocol.
//!
//! Clients drive the module with short colon-delimited ASCII commands.
//! Bulk payloads (ruleset uploads, debug watch lists) are announced by a
//! header carrying the expected length and CRC32, streamed in raw chunks
//! and terminated by a bare `END`.

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `GET:PROFILE` — send the device-profile payload, chunked.
    GetProfile,
    /// `GET:RULES` — echo the live ruleset bytes back, chunked.
    GetRules,
    /// `SET:RULES:RAM:<len>:<crc>` — begin a RAM-only ruleset upload.
    SetRulesRam { len: usize, crc: u32 },
    /// `SET:RULES:NVS:<len>:<crc>` — begin a persisted ruleset upload.
    SetRulesNvs { len: usize, crc: u32 },
    /// `CLEAR:RULES` — drop the live ruleset (and any persisted copy).
    ClearRules,
    /// `DEBUG:START` — resume debug updates for the current watch set.
    DebugStart,
    /// `DEBUG:STOP` — stop updates and drop the watch set.
    DebugStop,
    /// `DEBUG:WATCH:<len>:<crc>` — begin a watch-definition upload.
    DebugWatch { len: usize, crc: u32 },
}

impl Command {
    /// Parse one command line. `None` means the input is not a recognized
    /// command (the controller then treats it as stream data or noise).
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        match line {
            "GET:PROFILE" => return Some(Self::GetProfile),
            "GET:RULES" => return Some(Self::GetRules),
            "CLEAR:RULES" => return Some(Self::ClearRules),
            "DEBUG:START" => return Some(Self::DebugStart),
            "DEBUG:STOP" => return Some(Self::DebugStop),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("SET:RULES:RAM:") {
            let (len, crc) = parse_len_crc(rest)?;
            return Some(Self::SetRulesRam { len, crc });
        }
        if let Some(rest) = line.strip_prefix("SET:RULES:NVS:") {
            let (len, crc) = parse_len_crc(rest)?;
            return Some(Self::SetRulesNvs { len, crc });
        }
        if let Some(rest) = line.strip_prefix("DEBUG:WATCH:") {
            let (len, crc) = parse_len_crc(rest)?;
            return Some(Self::DebugWatch { len, crc });
        }

        None
    }
}

/// Parse the `<len>:<crc>` tail of a streaming header. Both fields are
/// decimal; a zero length or trailing garbage rejects the header.
fn parse_len_crc(rest: &str) -> Option<(usize, u32)> {
    let (len_s, crc_s) = rest.split_once(':')?;
    let len = len_s.parse::<usize>().ok()?;
    let crc = crc_s.parse::<u32>().ok()?;
    if len == 0 {
        return None;
    }
    Some((len, crc))
}
