//! Fuzz target: the WBP rules parser over arbitrary bytes.
//!
//! The parser fronts an untrusted BLE/serial upload path, so it must be
//! total: any byte sequence either parses into in-bounds tables or is
//! rejected, never a panic or an out-of-bounds read.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Every accepted payload has conditions indexing existing signals and
//!   rules whose action slices fit the action table
//!
//! cargo fuzz run fuzz_wbp_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use rulebus::wire::rules::parse_rules;

fuzz_target!(|data: &[u8]| {
    let Ok(parsed) = parse_rules(data) else {
        return;
    };

    for cond in &parsed.conditions {
        assert!(
            usize::from(cond.signal_idx) < parsed.signals.len(),
            "accepted condition references missing signal"
        );
    }
    for rule in &parsed.rules {
        let end = usize::from(rule.action_start) + usize::from(rule.action_count);
        assert!(
            end <= parsed.actions.len(),
            "accepted rule's action slice exceeds action table"
        );
        for bit in 0..32u8 {
            if rule.condition_mask & (1 << bit) != 0 {
                assert!(
                    usize::from(bit) < parsed.conditions.len(),
                    "accepted rule references missing condition"
                );
            }
        }
    }
    for action in &parsed.actions {
        assert!(!action.capability_id.is_empty(), "accepted empty capability id");
    }
});
