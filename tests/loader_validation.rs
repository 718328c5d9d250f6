//! Loader validation: every malformed payload is rejected and the live
//! ruleset stays byte-for-byte unchanged.

mod common;

use common::{RulesetBuilder, simple_ruleset};
use rulebus::LoadError;
use rulebus::engine::RuleEngine;

fn engine_with(cap: &str) -> RuleEngine {
    let mut engine = RuleEngine::new();
    engine.register_capability(cap, Box::new(|_| {}));
    engine
}

/// Load a known-good ruleset, then assert `bad` is rejected without
/// touching it.
fn assert_rejected_without_side_effects(bad: &[u8]) -> LoadError {
    let mut engine = engine_with("horn");
    let good = simple_ruleset("horn");
    engine.load_ruleset(&good).unwrap();

    let before_crc = engine.ruleset_crc();
    let before_bytes = engine.ruleset_binary().to_vec();
    let before_counts = (
        engine.signal_count(),
        engine.condition_count(),
        engine.action_count(),
        engine.rule_count(),
    );

    let err = engine.load_ruleset(bad).unwrap_err();

    assert_eq!(engine.ruleset_crc(), before_crc, "crc changed after rejected load");
    assert_eq!(engine.ruleset_binary(), before_bytes, "bytes changed after rejected load");
    assert_eq!(
        (
            engine.signal_count(),
            engine.condition_count(),
            engine.action_count(),
            engine.rule_count(),
        ),
        before_counts,
        "counts changed after rejected load"
    );
    err
}

#[test]
fn flipped_magic_byte() {
    let mut bad = simple_ruleset("horn");
    bad[0] ^= 0xFF;
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::BadMagic(_)
    ));
}

#[test]
fn version_below_minimum() {
    let mut bad = simple_ruleset("horn");
    bad[4] = 1;
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::UnsupportedVersion(1)
    ));
}

#[test]
fn declared_size_exceeds_buffer() {
    let mut bad = simple_ruleset("horn");
    let oversize = (bad.len() as u16 + 100).to_le_bytes();
    bad[6..8].copy_from_slice(&oversize);
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::BadTotalSize { .. }
    ));
}

#[test]
fn flipped_crc_byte() {
    let mut bad = simple_ruleset("horn");
    bad[18] ^= 0x01;
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::CrcMismatch { .. }
    ));
}

#[test]
fn flipped_payload_byte_fails_crc() {
    let mut bad = simple_ruleset("horn");
    let last = bad.len() - 2;
    bad[last] ^= 0x01;
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::CrcMismatch { .. }
    ));
}

#[test]
fn string_table_offset_outside_window() {
    // The header is not CRC-covered, so the offset can be corrupted alone.
    let mut bad = simple_ruleset("horn");
    bad[16..18].copy_from_slice(&0u16.to_le_bytes()); // inside the header
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::BadStringTableOffset(0)
    ));

    let mut bad = simple_ruleset("horn");
    let past_end = bad.len() as u16;
    bad[16..18].copy_from_slice(&past_end.to_le_bytes());
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::BadStringTableOffset(_)
    ));
}

#[test]
fn inflated_record_count_overruns_buffer() {
    let mut bad = simple_ruleset("horn");
    bad[8] = 200; // declares 200 signals, the buffer holds one
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::RecordOverflow
    ));
}

#[test]
fn action_param_with_invalid_type_code() {
    let bad = RulesetBuilder::new()
        .signal(0x100, 0, 16, 1.0, 0.0)
        .condition(0, 2, 50.0, 0.0)
        .action("horn", &[(9, 1)]) // type codes stop at 3
        .rule(0b1, 0, 0)
        .build();
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::BadParamType { action: 0, code: 9 }
    ));
}

#[test]
fn condition_references_missing_signal() {
    let bad = RulesetBuilder::new()
        .signal(0x100, 0, 16, 1.0, 0.0)
        .condition(3, 2, 50.0, 0.0) // only signal 0 exists
        .action("horn", &[])
        .rule(0b1, 0, 0)
        .build();
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::SignalIndexOutOfRange { condition: 0, signal: 3 }
    ));
}

#[test]
fn condition_with_invalid_operator() {
    let bad = RulesetBuilder::new()
        .signal(0x100, 0, 16, 1.0, 0.0)
        .condition(0, 99, 50.0, 0.0)
        .action("horn", &[])
        .rule(0b1, 0, 0)
        .build();
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::BadOperator { condition: 0, code: 99 }
    ));
}

#[test]
fn hold_duration_out_of_range() {
    // HOLD with value1 beyond 24h.
    let bad = RulesetBuilder::new()
        .signal(0x100, 0, 16, 1.0, 0.0)
        .condition(0, 8, 90_000_000.0, 0.0)
        .action("horn", &[])
        .rule(0b1, 0, 0)
        .build();
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::BadHoldDuration { condition: 0 }
    ));
}

#[test]
fn rule_mask_references_missing_condition() {
    let bad = RulesetBuilder::new()
        .signal(0x100, 0, 16, 1.0, 0.0)
        .condition(0, 2, 50.0, 0.0)
        .action("horn", &[])
        .rule(0b11, 0, 0) // bit 1 set, only condition 0 exists
        .build();
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::ConditionMaskOutOfRange { rule: 0, bit: 1 }
    ));
}

#[test]
fn rule_action_slice_exceeds_action_count() {
    let bad = RulesetBuilder::new()
        .signal(0x100, 0, 16, 1.0, 0.0)
        .condition(0, 2, 50.0, 0.0)
        .action("horn", &[])
        .rule_slice(0b1, 0, 5) // 5 actions claimed, 1 exists
        .build();
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::ActionSliceOutOfRange { rule: 0 }
    ));
}

#[test]
fn action_param_slice_exceeds_param_count() {
    let mut bad = RulesetBuilder::new()
        .signal(0x100, 0, 16, 1.0, 0.0)
        .condition(0, 2, 50.0, 0.0)
        .action("horn", &[(0, 1)])
        .rule(0b1, 0, 0)
        .build();
    // Bump the action's param_start past the declared param count and
    // re-seal the CRC so only the bounds check can fail.
    let action_off = 22 + 16 + 10;
    bad[action_off + 3] = 7;
    let crc = rulebus::wire::crc::crc32(&bad[22..]);
    bad[18..22].copy_from_slice(&crc.to_le_bytes());
    assert!(matches!(
        assert_rejected_without_side_effects(&bad),
        LoadError::ParamSliceOutOfRange { action: 0 }
    ));
}

#[test]
fn unknown_capability_is_reported_and_previous_ruleset_survives() {
    let mut engine = engine_with("horn");
    engine.load_ruleset(&simple_ruleset("horn")).unwrap();
    let live_crc = engine.ruleset_crc();

    let err = engine.load_ruleset(&simple_ruleset("missing")).unwrap_err();
    assert_eq!(err, LoadError::UnknownCapability(String::from("missing")));
    assert_eq!(err.unknown_capability(), Some("missing"));
    assert_eq!(engine.unknown_capability(), Some("missing"));

    // Previous ruleset still live and triggerable.
    assert_eq!(engine.ruleset_crc(), live_crc);
    let frame = rulebus::can::CanFrame::new(0x100, &100u16.to_le_bytes());
    engine.process_frame(&frame, 0);
    assert_eq!(engine.evaluate_rules(0), 1);
}

#[test]
fn parse_failure_keeps_earlier_unknown_capability_diagnostic() {
    let mut engine = engine_with("horn");
    engine.load_ruleset(&simple_ruleset("missing")).unwrap_err();
    assert_eq!(engine.unknown_capability(), Some("missing"));

    // A later parse-level rejection must not wipe the diagnostic.
    let mut garbage = simple_ruleset("horn");
    garbage[0] ^= 0xFF;
    engine.load_ruleset(&garbage).unwrap_err();
    assert_eq!(engine.unknown_capability(), Some("missing"));

    // A successful load clears it.
    engine.load_ruleset(&simple_ruleset("horn")).unwrap();
    assert_eq!(engine.unknown_capability(), None);
}

#[test]
fn reload_of_identical_bytes_resets_runtime_state() {
    let mut engine = engine_with("horn");
    let payload = simple_ruleset("horn");

    engine.load_ruleset(&payload).unwrap();
    let frame = rulebus::can::CanFrame::new(0x100, &100u16.to_le_bytes());
    engine.process_frame(&frame, 0);
    assert_eq!(engine.evaluate_rules(0), 1);

    // Second load of the same bytes: identical tables, zeroed state — the
    // signal is unseen again so nothing fires until a new frame arrives.
    engine.load_ruleset(&payload).unwrap();
    assert_eq!(engine.ruleset_binary(), payload);
    assert_eq!(engine.evaluate_rules(10), 0);
    engine.process_frame(&frame, 20);
    assert_eq!(engine.evaluate_rules(20), 1);
}

#[test]
fn truncated_payloads_never_load() {
    let good = simple_ruleset("horn");
    let mut engine = engine_with("horn");
    for len in 0..good.len() {
        assert!(
            engine.load_ruleset(&good[..len]).is_err(),
            "truncated payload of {len} bytes must not load"
        );
    }
    engine.load_ruleset(&good).unwrap();
}
