//! Controller — ties the engine to its ports.
//!
//! Owns the [`RuleEngine`], the text command protocol, chunked payload
//! streaming in both directions, periodic status broadcasts and ruleset
//! persistence. Driven by the host: `handle_packet` for every transport
//! packet, `tick` once per loop iteration.

use core::fmt::Write as _;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::ModuleConfig;
use crate::engine::RuleEngine;
use crate::engine::types::{CapabilityHandler, CapabilityMeta};
use crate::error::{Error, Result};
use crate::wire::crc::crc32;
use crate::wire::profile::{ProfileInfo, serialize_profile};

use super::commands::Command;
use super::events::AppEvent;
use super::ports::{EventSink, FrameSource, StoragePort, TransportPort};

/// Storage namespace for all controller keys.
const NVS_NAMESPACE: &str = "rulebus";
/// Key holding the postcard-encoded [`PersistState`].
const KEY_STATE: &str = "state";
/// Key holding the raw persisted ruleset bytes.
const KEY_RULES: &str = "rules";

/// Uploads larger than this are aborted mid-stream.
const MAX_STREAM_LEN: usize = 8192;

/// Counters that survive reboot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct PersistState {
    boot_count: u16,
}

/// What the current inbound byte stream will become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    RulesetRam,
    RulesetNvs,
    DebugWatch,
}

struct Stream {
    kind: StreamKind,
    expected_len: usize,
    expected_crc: u32,
    buf: Vec<u8>,
}

/// Ruleset provenance, reported in status and profile payloads.
/// 0 = none, 1 = RAM-only, 2 = persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RulesMode {
    None = 0,
    Ram = 1,
    Persisted = 2,
}

pub struct Controller {
    config: ModuleConfig,
    engine: RuleEngine,
    stream: Option<Stream>,
    rules_mode: RulesMode,
    boot_count: u16,
    last_status_ms: u32,
    last_debug_tx_ms: u32,
}

impl Controller {
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            config,
            engine: RuleEngine::new(),
            stream: None,
            rules_mode: RulesMode::None,
            boot_count: 0,
            last_status_ms: 0,
            last_debug_tx_ms: 0,
        }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn register_capability(&mut self, id: &str, handler: CapabilityHandler) {
        self.engine.register_capability(id, handler);
    }

    pub fn register_capability_with_meta(
        &mut self,
        id: &str,
        handler: CapabilityHandler,
        meta: CapabilityMeta,
    ) {
        self.engine.register_capability_with_meta(id, handler, meta);
    }

    // ── Startup ───────────────────────────────────────────────

    /// Restore persisted state: bump the boot counter and reload any
    /// persisted ruleset. Storage trouble degrades to a fresh boot rather
    /// than failing startup; an invalid persisted blob is deleted.
    pub fn begin(&mut self, storage: &mut impl StoragePort, sink: &mut impl EventSink) {
        let mut state = match storage.read(NVS_NAMESPACE, KEY_STATE) {
            Ok(bytes) => postcard::from_bytes(&bytes).unwrap_or_default(),
            Err(_) => PersistState::default(),
        };
        state.boot_count = state.boot_count.wrapping_add(1);
        self.boot_count = state.boot_count;

        match postcard::to_allocvec(&state) {
            Ok(bytes) => {
                if let Err(e) = storage.write(NVS_NAMESPACE, KEY_STATE, &bytes) {
                    warn!("failed to persist boot state: {e}");
                }
            }
            Err(_) => warn!("failed to encode boot state"),
        }

        let mut persisted_rules = false;
        if let Ok(blob) = storage.read(NVS_NAMESPACE, KEY_RULES) {
            match self.engine.load_ruleset(&blob) {
                Ok(_) => {
                    self.rules_mode = RulesMode::Persisted;
                    persisted_rules = true;
                    info!("restored persisted ruleset ({} rules)", self.engine.rule_count());
                }
                Err(e) => {
                    warn!("persisted ruleset invalid ({e}), deleting");
                    let _ = storage.delete(NVS_NAMESPACE, KEY_RULES);
                }
            }
        }

        sink.emit(&AppEvent::Started {
            boot_count: self.boot_count,
            persisted_rules,
        });
        info!("controller started, boot #{}", self.boot_count);
    }

    // ── Inbound packets ───────────────────────────────────────

    /// Process one transport packet: stream data while an upload is open,
    /// a command otherwise.
    pub fn handle_packet(
        &mut self,
        data: &[u8],
        transport: &mut impl TransportPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
        now_ms: u32,
    ) {
        if self.stream.is_some() {
            self.handle_stream_data(data, transport, storage, sink);
            return;
        }

        let Ok(text) = core::str::from_utf8(data) else {
            warn!("non-UTF-8 packet outside a stream, dropping {} bytes", data.len());
            return;
        };
        let Some(cmd) = Command::parse(text) else {
            warn!("unrecognized command: {text:?}");
            return;
        };

        match cmd {
            Command::GetProfile => self.send_profile(transport, now_ms),
            Command::GetRules => self.send_rules(transport),
            Command::ClearRules => {
                self.engine.clear_ruleset();
                self.rules_mode = RulesMode::None;
                let _ = storage.delete(NVS_NAMESPACE, KEY_RULES);
                transport.send(b"RULES:CLEARED");
                sink.emit(&AppEvent::RulesetCleared);
            }
            Command::DebugStart => self.engine.debug_watch_start(),
            Command::DebugStop => self.engine.debug_watch_stop(),
            Command::SetRulesRam { len, crc } => {
                self.open_stream(StreamKind::RulesetRam, len, crc, transport);
            }
            Command::SetRulesNvs { len, crc } => {
                self.open_stream(StreamKind::RulesetNvs, len, crc, transport);
            }
            Command::DebugWatch { len, crc } => {
                self.open_stream(StreamKind::DebugWatch, len, crc, transport);
            }
        }
    }

    fn open_stream(
        &mut self,
        kind: StreamKind,
        len: usize,
        crc: u32,
        transport: &mut impl TransportPort,
    ) {
        if len > MAX_STREAM_LEN {
            warn!("rejecting {len}-byte upload (limit {MAX_STREAM_LEN})");
            transport.send(b"ERR:LEN_MISMATCH");
            return;
        }
        self.stream = Some(Stream {
            kind,
            expected_len: len,
            expected_crc: crc,
            buf: Vec::with_capacity(len),
        });
    }

    fn handle_stream_data(
        &mut self,
        data: &[u8],
        transport: &mut impl TransportPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        if data == b"END" {
            self.finalize_stream(transport, storage, sink);
            return;
        }

        // Borrow checked above; the stream can only vanish in finalize.
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        if stream.buf.len() + data.len() > stream.expected_len {
            warn!("stream overran declared length, aborting");
            transport.send(b"ERR:LEN_MISMATCH");
            self.stream = None;
            return;
        }
        stream.buf.extend_from_slice(data);
    }

    fn finalize_stream(
        &mut self,
        transport: &mut impl TransportPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let Some(stream) = self.stream.take() else {
            return;
        };

        if stream.buf.len() != stream.expected_len {
            warn!(
                "stream length mismatch: got {}, expected {}",
                stream.buf.len(),
                stream.expected_len
            );
            transport.send(b"ERR:LEN_MISMATCH");
            return;
        }

        let computed = crc32(&stream.buf);
        if computed != stream.expected_crc {
            warn!("stream CRC mismatch: 0x{computed:08X} != 0x{:08X}", stream.expected_crc);
            transport.send(b"ERR:CRC_FAIL");
            return;
        }

        match stream.kind {
            StreamKind::DebugWatch => {
                // Malformed definitions are skipped by the watch parser, so
                // a lossy conversion is enough here.
                let defs = String::from_utf8_lossy(&stream.buf);
                let count = self.engine.debug_watch_load(&defs);
                info!("debug watch loaded: {count} signals");
                let mut reply = heapless::String::<32>::new();
                if write!(reply, "DEBUG:OK:{count}").is_ok() {
                    transport.send(reply.as_bytes());
                }
            }
            StreamKind::RulesetRam | StreamKind::RulesetNvs => {
                let persist_to_nvs = stream.kind == StreamKind::RulesetNvs;
                match self.engine.load_ruleset(&stream.buf) {
                    Ok(persist_requested) => {
                        self.rules_mode = if persist_to_nvs {
                            RulesMode::Persisted
                        } else {
                            RulesMode::Ram
                        };
                        if persist_to_nvs || persist_requested {
                            if let Err(e) = self.persist_rules(storage) {
                                warn!("ruleset persistence failed: {e}");
                            } else {
                                self.rules_mode = RulesMode::Persisted;
                            }
                        }
                        transport.send(b"RULES:OK");
                        sink.emit(&AppEvent::RulesetLoaded {
                            signals: self.engine.signal_count() as u8,
                            conditions: self.engine.condition_count() as u8,
                            actions: self.engine.action_count() as u8,
                            rules: self.engine.rule_count() as u8,
                            crc: self.engine.ruleset_crc(),
                            persisted: self.rules_mode == RulesMode::Persisted,
                        });
                    }
                    Err(e) => {
                        if let Some(id) = e.unknown_capability() {
                            let mut reply = heapless::String::<96>::new();
                            if write!(reply, "ERR:CAP_UNKNOWN:{id}").is_ok() {
                                transport.send(reply.as_bytes());
                            } else {
                                transport.send(b"ERR:RULES_INVALID");
                            }
                        } else {
                            transport.send(b"ERR:RULES_INVALID");
                        }
                        sink.emit(&AppEvent::RulesetRejected {
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn persist_rules(&mut self, storage: &mut impl StoragePort) -> Result<()> {
        storage
            .write(NVS_NAMESPACE, KEY_RULES, self.engine.ruleset_binary())
            .map_err(Error::from)
    }

    // ── Main loop ─────────────────────────────────────────────

    /// One loop iteration: drain pending frames, evaluate every rule once,
    /// then push debug and status updates if their intervals elapsed.
    pub fn tick(
        &mut self,
        frames: &mut impl FrameSource,
        transport: &mut impl TransportPort,
        sink: &mut impl EventSink,
        now_ms: u32,
    ) {
        while let Some(frame) = frames.receive() {
            self.engine.process_frame(&frame, now_ms);
        }

        let fired = self.engine.evaluate_rules(now_ms);
        if fired > 0 {
            sink.emit(&AppEvent::RulesFired { count: fired });
        }

        if transport.is_connected() {
            self.send_debug_updates(transport, now_ms);
            if now_ms.wrapping_sub(self.last_status_ms) >= self.config.status_interval_ms {
                self.send_status(transport, now_ms);
                self.last_status_ms = now_ms;
            }
        }
    }

    /// Drop per-connection state when the client goes away.
    pub fn on_disconnect(&mut self, sink: &mut impl EventSink) {
        self.stream = None;
        self.engine.debug_watch_stop();
        sink.emit(&AppEvent::Connection { connected: false });
    }

    // ── Outbound payloads ─────────────────────────────────────

    /// `D:S:<canId>:<startBit>:<value>` — at most one update per call, rate
    /// limited so a noisy signal cannot saturate the transport.
    fn send_debug_updates(&mut self, transport: &mut impl TransportPort, now_ms: u32) {
        if !self.engine.debug_watch_enabled() {
            return;
        }
        if now_ms.wrapping_sub(self.last_debug_tx_ms) < self.config.debug_tx_min_interval_ms {
            return;
        }
        let Some(sample) = self.engine.debug_pop_dirty() else {
            return;
        };
        let mut msg = heapless::String::<64>::new();
        if write!(
            msg,
            "D:S:{}:{}:{:.2}",
            sample.def.can_id, sample.def.start_bit, sample.value
        )
        .is_ok()
        {
            transport.send_status(msg.as_bytes());
            self.last_debug_tx_ms = now_ms;
        }
    }

    /// `S:<mode>:<signals>:<rules>:<busIds>:<uptimeMs>:<boots>`
    fn send_status(&self, transport: &mut impl TransportPort, now_ms: u32) {
        let mut msg = heapless::String::<128>::new();
        if write!(
            msg,
            "S:{}:{}:{}:{}:{}:{}",
            self.rules_mode as u8,
            self.engine.signal_count(),
            self.engine.rule_count(),
            self.engine.unique_can_ids(),
            now_ms,
            self.boot_count
        )
        .is_ok()
        {
            transport.send_status(msg.as_bytes());
        }
    }

    /// `GET:RULES` reply: `BEGIN`, raw ruleset bytes in MTU-sized chunks,
    /// `END:<len>:<crc>`.
    fn send_rules(&self, transport: &mut impl TransportPort) {
        if !self.engine.has_ruleset() {
            transport.send(b"ERR:NO_RULES");
            return;
        }
        let bytes = self.engine.ruleset_binary();
        send_chunked(transport, bytes, self.engine.ruleset_crc());
    }

    /// `GET:PROFILE` reply, same framing as rules.
    fn send_profile(&self, transport: &mut impl TransportPort, now_ms: u32) {
        let info = ProfileInfo {
            module_id: &self.config.module_id,
            hw_version: &self.config.hw_version,
            fw_version: &self.config.fw_version,
            serial: &self.config.serial,
            uptime_ms: now_ms,
            boot_count: self.boot_count,
            rules_mode: self.rules_mode as u8,
            rules_crc: self.engine.ruleset_crc(),
            signal_count: self.engine.signal_count() as u8,
            condition_count: self.engine.condition_count() as u8,
            action_count: self.engine.action_count() as u8,
            rule_count: self.engine.rule_count() as u8,
        };

        let mut buf = vec![0u8; self.config.profile_buffer_len];
        let Some(len) = serialize_profile(&mut buf, &info, self.engine.capabilities()) else {
            transport.send(b"ERR:PROFILE_TOO_LARGE");
            return;
        };
        let payload = &buf[..len];
        send_chunked(transport, payload, crc32(payload));
    }
}

/// `BEGIN` → MTU-sized chunks → `END:<len>:<crc>`.
fn send_chunked(transport: &mut impl TransportPort, payload: &[u8], crc: u32) {
    transport.send(b"BEGIN");
    let mtu = transport.mtu().max(1);
    for chunk in payload.chunks(mtu) {
        transport.send(chunk);
    }
    let mut footer = heapless::String::<48>::new();
    if write!(footer, "END:{}:{}", payload.len(), crc).is_ok() {
        transport.send(footer.as_bytes());
    }
}
