//! Tests for the connection worker across its thread boundary
//!
//! Tests deferred cancellation while the render cache is locked, pixel
//! conversion on the worker, and input delivery order.

use proptest::prelude::*;
use rdpbridge_core::engine::{NoChannels, RenderHook, ScriptStep, ScriptedEngine};
use rdpbridge_core::input::{InputEvent, InputKind, PointerFlags, Scancode};
use rdpbridge_core::ui::{ChannelWaker, GuiWaker, Region, UiOperation};
use rdpbridge_core::{BridgeConfig, CloseReason, ConnectionWorker, ControlSignal, DisplayLink, WorkerExit};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn waker() -> Arc<dyn GuiWaker> {
    let (tx, _rx) = mpsc::channel();
    Arc::new(ChannelWaker::new(tx))
}

fn wait_closed(link: &DisplayLink) -> WorkerExit {
    match link.control.recv_timeout(Duration::from_secs(5)) {
        Ok(ControlSignal::Closed(exit)) => exit,
        Err(e) => panic!("worker did not close: {e}"),
    }
}

#[test]
fn test_cancel_waits_for_render_lock_release() {
    let cancel_requested = Arc::new(AtomicBool::new(false));
    let cancel_seen_locked = Arc::new(AtomicBool::new(false));
    let lock_released = Arc::new(AtomicBool::new(false));
    let (held_tx, held_rx) = mpsc::channel::<()>();
    let (go_tx, go_rx) = mpsc::channel::<()>();
    let hook: RenderHook = {
        let cancel_requested = Arc::clone(&cancel_requested);
        let cancel_seen_locked = Arc::clone(&cancel_seen_locked);
        let lock_released = Arc::clone(&lock_released);
        Box::new(move |_cache| {
            held_tx.send(()).unwrap();
            go_rx.recv().unwrap();
            cancel_seen_locked.store(cancel_requested.load(Ordering::SeqCst), Ordering::SeqCst);
            // Last access under the lock
            lock_released.store(true, Ordering::SeqCst);
        })
    };

    let (engine, feeder) = ScriptedEngine::new().unwrap();
    let (handle, link) =
        ConnectionWorker::spawn(&BridgeConfig::default(), engine, NoChannels, waker()).unwrap();
    feeder.push(ScriptStep::WithRenderCache(hook)).unwrap();
    held_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    handle.close();
    cancel_requested.store(true, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));
    assert!(!handle.is_finished());
    assert!(link.control.try_recv().is_err());
    assert!(!lock_released.load(Ordering::SeqCst));

    go_tx.send(()).unwrap();
    let exit = wait_closed(&link);
    assert_eq!(exit.reason, CloseReason::Cancelled);
    assert!(lock_released.load(Ordering::SeqCst));
    assert!(cancel_seen_locked.load(Ordering::SeqCst));
    handle.join();
}

#[test]
fn test_paint_bitmap_is_converted_on_worker() {
    let config = BridgeConfig::default();
    let (engine, _feeder) = ScriptedEngine::with_steps(vec![ScriptStep::PaintBitmap {
        x: 0,
        y: 0,
        width: 2,
        height: 2,
        data: [0x00, 0xf8].repeat(4),
    }])
    .unwrap();
    let (handle, link) = ConnectionWorker::spawn(&config, engine, NoChannels, waker()).unwrap();
    assert_eq!(wait_closed(&link).reason, CloseReason::Disconnected);
    handle.join();

    let mut ops = Vec::new();
    link.ui.drain_into(|op| ops.push(op));
    assert_eq!(
        ops,
        vec![UiOperation::PaintBitmap {
            dest: Region::new(0, 0, 2, 2),
            width: 2,
            height: 2,
            data: [0x00, 0x00, 0xff, 0xff].repeat(4),
        }]
    );
}

#[test]
fn test_input_events_arrive_in_order() {
    let (engine, feeder) = ScriptedEngine::new().unwrap();
    let (handle, link) =
        ConnectionWorker::spawn(&BridgeConfig::default(), engine, NoChannels, waker()).unwrap();
    link.input.push(InputEvent::key(Scancode::standard(65), true));
    link.input.push(InputEvent::key(Scancode::standard(66), true));
    link.input.push(InputEvent::Mouse {
        flags: PointerFlags::DOWN | PointerFlags::BUTTON1,
        x: 10,
        y: 20,
    });

    let mut inputs = Vec::new();
    for _ in 0..500 {
        inputs = feeder.inputs();
        if inputs.len() >= 3 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(inputs.len(), 3);
    assert_eq!(inputs[0].kind, InputKind::Scancode);
    assert_eq!(inputs[0].param1, 65);
    assert_eq!(inputs[1].param1, 66);
    assert_eq!(inputs[2].kind, InputKind::Mouse);
    assert_eq!((inputs[2].param1, inputs[2].param2), (10, 20));

    handle.close();
    assert_eq!(wait_closed(&link).reason, CloseReason::Cancelled);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Whatever the script, the worker reports exactly one close
    #[test]
    fn prop_single_close_notification(rects in prop::collection::vec((0i32..64, 0i32..64, any::<u16>()), 0..20)) {
        let steps = rects
            .into_iter()
            .map(|(x, y, color)| ScriptStep::Rect {
                dest: Region::new(x, y, 8, 8),
                color: u32::from(color),
                rop: 0xf0,
            })
            .collect();
        let (engine, _feeder) = ScriptedEngine::with_steps(steps).unwrap();
        let (handle, link) =
            ConnectionWorker::spawn(&BridgeConfig::default(), engine, NoChannels, waker()).unwrap();
        prop_assert_eq!(wait_closed(&link).reason, CloseReason::Disconnected);
        handle.join();
        prop_assert!(link.control.try_recv().is_err());
    }
}
