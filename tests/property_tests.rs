//! Property tests: the parser and bit extractor must be total over
//! arbitrary input — reject or decode, never panic.

mod common;

use common::RulesetBuilder;
use proptest::prelude::*;
use rulebus::engine::bitfield::extract_bits;
use rulebus::wire::rules::parse_rules;
use rulebus::wire::{RULES_HEADER_LEN, RULES_MAGIC, WBP_VERSION};

proptest! {
    #[test]
    fn parse_never_panics_on_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = parse_rules(&data);
    }

    #[test]
    fn parse_never_panics_with_plausible_header(
        body in proptest::collection::vec(any::<u8>(), 0..256),
        counts in proptest::collection::vec(any::<u8>(), 4),
        st_off in any::<u16>(),
    ) {
        // Valid magic and version so fuzzing reaches the deeper checks.
        let mut data = vec![0u8; RULES_HEADER_LEN];
        data[..4].copy_from_slice(&RULES_MAGIC.to_le_bytes());
        data[4] = WBP_VERSION;
        data.extend_from_slice(&body);
        let total = data.len().min(usize::from(u16::MAX)) as u16;
        data[6..8].copy_from_slice(&total.to_le_bytes());
        data[8..12].copy_from_slice(&counts);
        data[16..18].copy_from_slice(&st_off.to_le_bytes());
        let _ = parse_rules(&data);
    }

    #[test]
    fn valid_payloads_always_parse(
        can_id in any::<u32>(),
        start_bit in 0u16..64,
        bit_length in 1u8..=32,
        threshold in -1000.0f32..1000.0,
        debounce_ds in any::<u8>(),
        cooldown_ds in any::<u8>(),
    ) {
        let payload = RulesetBuilder::new()
            .signal(can_id, start_bit, bit_length, 1.0, 0.0)
            .condition(0, 2, threshold, 0.0)
            .action("cap", &[])
            .rule(0b1, debounce_ds, cooldown_ds)
            .build();
        let parsed = parse_rules(&payload).expect("builder output must parse");
        prop_assert_eq!(parsed.signals.len(), 1);
        prop_assert_eq!(parsed.rules.len(), 1);
        prop_assert_eq!(parsed.rules[0].debounce_ms, u16::from(debounce_ds) * 10);
        prop_assert_eq!(parsed.rules[0].cooldown_ms, u16::from(cooldown_ds) * 10);
    }

    #[test]
    fn extract_bits_is_total(
        data in any::<[u8; 8]>(),
        start in any::<u16>(),
        len in any::<u8>(),
        big_endian in any::<bool>(),
    ) {
        let v = extract_bits(&data, start, len, big_endian);
        if len == 0 || len > 64 {
            prop_assert_eq!(v, 0);
        } else if len < 64 {
            prop_assert!(v < (1u64 << len));
        }
    }

    #[test]
    fn corrupting_any_payload_byte_is_caught(
        idx in 0usize..64,
        flip in 1u8..=255,
    ) {
        let payload = RulesetBuilder::new()
            .signal(0x100, 0, 16, 1.0, 0.0)
            .condition(0, 2, 50.0, 0.0)
            .action("cap", &[])
            .rule(0b1, 0, 0)
            .build();
        let mut bad = payload.clone();
        let idx = idx % bad.len();
        bad[idx] ^= flip;
        match parse_rules(&bad) {
            // A flip inside the header's CRC field or a flip that the
            // validation ladder catches: rejected.
            Err(_) => {}
            // The only acceptable survivors are flips in header bytes the
            // parser tolerates (e.g. reserved meta offset) — the payload
            // body itself is CRC-protected.
            Ok(_) => prop_assert!(idx < RULES_HEADER_LEN, "body flip at {idx} slipped through CRC"),
        }
    }
}
