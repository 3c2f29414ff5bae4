//! Property-based tests for input handling
//!
//! Tests the held-key set used for focus-loss releases, the input channel's
//! ordering and wake-up pipe, and pointer coordinate translation.

use proptest::prelude::*;
use rdpbridge_core::input::{
    InputEvent, InputEventChannel, PointerFlags, PointerTransform, PressedKeys, Scancode,
};
use std::collections::BTreeSet;

/// Strategy for a set of distinct scancodes, standard and extended
fn arb_scancodes() -> impl Strategy<Value = BTreeSet<Scancode>> {
    prop::collection::btree_set(
        (1u8..0x60, any::<bool>()).prop_map(|(code, extended)| Scancode::new(code, extended)),
        0..20,
    )
}

/// Keys named by a batch of release events
///
/// Fails on a press or a pointer event.
fn released_keys(events: &[InputEvent]) -> Result<BTreeSet<Scancode>, TestCaseError> {
    let mut keys = BTreeSet::new();
    for event in events {
        match *event {
            InputEvent::Scancode { pressed: false, extended, code } => {
                prop_assert!(keys.insert(Scancode::new(code, extended)), "released twice: {code:#x}");
            }
            other => prop_assert!(false, "not a key release: {other:?}"),
        }
    }
    Ok(keys)
}

/// Strategy for one input event
fn arb_event() -> impl Strategy<Value = InputEvent> {
    prop_oneof![
        (1u8..0x80, any::<bool>(), any::<bool>()).prop_map(|(code, extended, pressed)| {
            InputEvent::key(Scancode::new(code, extended), pressed)
        }),
        (any::<u16>(), any::<u16>()).prop_map(|(x, y)| InputEvent::Mouse {
            flags: PointerFlags::MOVE,
            x,
            y,
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every held key is released exactly once, and only held keys
    #[test]
    fn prop_release_all_releases_each_held_key(codes in arb_scancodes()) {
        let mut keys = PressedKeys::new();
        for &code in &codes {
            keys.press(code);
            // Auto-repeat
            keys.press(code);
        }
        prop_assert_eq!(keys.len(), codes.len());

        let releases = keys.release_all();
        prop_assert_eq!(releases.len(), codes.len());
        prop_assert_eq!(released_keys(&releases)?, codes);
        prop_assert!(keys.is_empty());
        prop_assert!(keys.release_all().is_empty());
    }

    /// Released keys are not released again on focus loss
    #[test]
    fn prop_released_keys_are_forgotten(codes in arb_scancodes()) {
        let mut keys = PressedKeys::new();
        for &code in &codes {
            keys.press(code);
        }
        let mut still_held = BTreeSet::new();
        for (i, &code) in codes.iter().enumerate() {
            if i % 2 == 0 {
                keys.release(code);
            } else {
                still_held.insert(code);
            }
        }
        prop_assert_eq!(released_keys(&keys.release_all())?, still_held);
        prop_assert!(keys.release_all().is_empty());
    }

    /// Events come out of the channel in push order and the pipe is cleared
    #[test]
    fn prop_channel_preserves_order(events in prop::collection::vec(arb_event(), 0..200)) {
        let (sender, mut receiver) = InputEventChannel::new().unwrap().split();
        for &event in &events {
            sender.push(event);
        }
        prop_assert_eq!(receiver.is_signalled(), !events.is_empty());
        prop_assert_eq!(receiver.drain(), events);
        prop_assert!(!receiver.is_signalled());
    }

    /// Translated pointer positions always land on the remote desktop
    #[test]
    fn prop_pointer_stays_on_desktop(
        remote in (1u32..4000, 1u32..4000),
        scaled in (0u32..4000, 0u32..4000),
        x in -100.0f64..10_000.0,
        y in -100.0f64..10_000.0,
    ) {
        let transform = PointerTransform::scaled(remote.0, remote.1, scaled.0, scaled.1);
        let (rx, ry) = transform.translate(x, y);
        prop_assert!(u32::from(rx) < remote.0);
        prop_assert!(u32::from(ry) < remote.1);
    }
}
