//! Property-based tests for the UI operation queue
//!
//! Tests ordering and wake-up coalescing between the worker end and the
//! GUI end of the queue.

use proptest::prelude::*;
use rdpbridge_core::ui::{ui_queue, GuiWaker, Region, UiOperation};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Waker that counts how often it was called
#[derive(Default)]
struct CountingWaker {
    wakes: AtomicUsize,
}

impl GuiWaker for CountingWaker {
    fn wake(&self) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Strategy for a small region
fn arb_region() -> impl Strategy<Value = Region> {
    (-8i32..64, -8i32..64, 0u32..32, 0u32..32).prop_map(|(x, y, w, h)| Region::new(x, y, w, h))
}

/// Strategy for operations that carry no object ids
fn arb_operation() -> impl Strategy<Value = UiOperation> {
    prop_oneof![
        (arb_region(), any::<u32>(), any::<u8>())
            .prop_map(|(dest, color, rop)| UiOperation::Rect { dest, color, rop }),
        (arb_region(), any::<u8>()).prop_map(|(dest, rop)| UiOperation::DestBlt { rop, dest }),
        arb_region().prop_map(|clip| UiOperation::SetClip { clip }),
        Just(UiOperation::ResetClip),
        Just(UiOperation::DefaultCursor),
        (1u32..64, 1u32..64).prop_map(|(width, height)| UiOperation::DesktopResize { width, height }),
    ]
}

/// Strategy for batch sizes, always covering the small edge cases
fn arb_batch_len() -> impl Strategy<Value = usize> {
    prop_oneof![Just(0usize), Just(1), Just(2), Just(100), 0usize..200]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every pushed operation is applied exactly once, in push order
    #[test]
    fn prop_drain_preserves_push_order(
        ops in arb_batch_len().prop_flat_map(|n| prop::collection::vec(arb_operation(), n))
    ) {
        let waker = Arc::new(CountingWaker::default());
        let (producer, consumer) = ui_queue(Arc::clone(&waker) as Arc<dyn GuiWaker>);
        for op in ops.clone() {
            producer.push(op);
        }

        let mut applied = Vec::new();
        let count = consumer.drain_into(|op| applied.push(op));

        prop_assert_eq!(count, ops.len());
        prop_assert_eq!(applied, ops);
        prop_assert!(consumer.is_empty());
        prop_assert!(!consumer.is_drain_scheduled());
    }

    /// A burst of pushes schedules a single drain
    #[test]
    fn prop_pushes_coalesce_into_one_wake(
        ops in prop::collection::vec(arb_operation(), 1..100)
    ) {
        let waker = Arc::new(CountingWaker::default());
        let (producer, consumer) = ui_queue(Arc::clone(&waker) as Arc<dyn GuiWaker>);
        for op in ops {
            producer.push(op);
        }
        prop_assert_eq!(waker.wakes.load(Ordering::SeqCst), 1);
        prop_assert!(consumer.is_drain_scheduled());

        consumer.drain_into(|_| {});
        producer.push(UiOperation::ResetClip);
        prop_assert_eq!(waker.wakes.load(Ordering::SeqCst), 2);
    }

    /// Operations pushed while a drain runs are left for a follow-up drain
    #[test]
    fn prop_push_during_drain_reschedules(
        first in prop::collection::vec(arb_operation(), 1..20),
        second in prop::collection::vec(arb_operation(), 1..20),
    ) {
        let waker = Arc::new(CountingWaker::default());
        let (producer, consumer) = ui_queue(Arc::clone(&waker) as Arc<dyn GuiWaker>);
        for op in first.clone() {
            producer.push(op);
        }

        let mut pending = Some(second.clone());
        let applied = consumer.drain_into(|_| {
            if let Some(late) = pending.take() {
                for op in late {
                    producer.push(op);
                }
            }
        });

        prop_assert_eq!(applied, first.len());
        prop_assert_eq!(consumer.len(), second.len());
        prop_assert!(consumer.is_drain_scheduled());
        prop_assert_eq!(waker.wakes.load(Ordering::SeqCst), 2);

        let mut rest = Vec::new();
        consumer.drain_into(|op| rest.push(op));
        prop_assert_eq!(rest, second);
        prop_assert!(!consumer.is_drain_scheduled());
    }
}
