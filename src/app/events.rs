//! Application lifecycle events.

/// Emitted through [`EventSink`](super::ports::EventSink) as the controller
/// changes state. Variants carry only what a telemetry consumer needs.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Controller finished `begin`.
    Started { boot_count: u16, persisted_rules: bool },
    /// A ruleset passed validation and is now live.
    RulesetLoaded {
        signals: u8,
        conditions: u8,
        actions: u8,
        rules: u8,
        crc: u32,
        persisted: bool,
    },
    /// An upload was rejected; the previous ruleset keeps running.
    RulesetRejected { reason: String },
    /// The live ruleset was dropped.
    RulesetCleared,
    /// One evaluation pass fired this many rules.
    RulesFired { count: u32 },
    /// A client connected or disconnected.
    Connection { connected: bool },
}
