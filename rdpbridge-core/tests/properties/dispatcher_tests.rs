//! Property-based tests for the display dispatcher
//!
//! Tests object lifecycles against a model of the live id set and the
//! clipping of solid fills on the primary canvas.

use proptest::prelude::*;
use rdpbridge_core::display::{DisplayDispatcher, HeadlessService};
use rdpbridge_core::pixel::ColorDepth;
use rdpbridge_core::ui::{ObjectId, ObjectIdAllocator, Region, UiOperation, ROP3_PATCOPY, ROP3_SRCCOPY};

/// One step of a random object lifecycle; indices pick among live objects
#[derive(Debug, Clone)]
enum Action {
    CreateBitmap,
    CreateSurface,
    Destroy(usize),
    Blit(usize),
    Target(Option<usize>),
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        2 => Just(Action::CreateBitmap),
        2 => Just(Action::CreateSurface),
        2 => any::<usize>().prop_map(Action::Destroy),
        3 => any::<usize>().prop_map(Action::Blit),
        1 => prop::option::of(any::<usize>()).prop_map(Action::Target),
    ]
}

fn arb_region() -> impl Strategy<Value = Region> {
    (-10i32..40, -10i32..40, 0u32..40, 0u32..40).prop_map(|(x, y, w, h)| Region::new(x, y, w, h))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Operations that only name live objects never dangle, and the arena
    /// holds exactly the live set
    #[test]
    fn prop_object_lifecycle_matches_model(actions in prop::collection::vec(arb_action(), 0..60)) {
        let mut dispatcher = DisplayDispatcher::new(ColorDepth::Bpp32, 16, 16);
        let mut service = HeadlessService::new();
        let mut ids = ObjectIdAllocator::new();
        let mut live: Vec<ObjectId> = Vec::new();
        let mut target: Option<ObjectId> = None;

        for action in actions {
            let op = match action {
                Action::CreateBitmap => {
                    let id = ids.allocate();
                    live.push(id);
                    UiOperation::CreateBitmap { id, width: 4, height: 4, data: vec![0x7f; 64] }
                }
                Action::CreateSurface => {
                    let id = ids.allocate();
                    live.push(id);
                    UiOperation::CreateSurface { id, width: 8, height: 8, replaces: None }
                }
                Action::Destroy(_) | Action::Blit(_) | Action::Target(Some(_)) if live.is_empty() => {
                    continue;
                }
                Action::Destroy(index) => {
                    let id = live.remove(index % live.len());
                    if target == Some(id) {
                        target = None;
                    }
                    UiOperation::DestroySurface { id }
                }
                Action::Blit(index) => UiOperation::MemBlt {
                    rop: ROP3_SRCCOPY,
                    id: live[index % live.len()],
                    dest: Region::new(1, 1, 4, 4),
                    src_x: 0,
                    src_y: 0,
                },
                Action::Target(index) => {
                    target = index.map(|i| live[i % live.len()]);
                    UiOperation::SetSurface { id: target }
                }
            };
            dispatcher.apply(op, &mut service);
            prop_assert_eq!(dispatcher.target(), target);
        }

        prop_assert_eq!(dispatcher.dangling_references(), 0);
        prop_assert_eq!(dispatcher.object_count(), live.len());
        for id in &live {
            prop_assert!(dispatcher.object(*id).is_some());
        }
    }

    /// A fill changes exactly the pixels inside destination, clip and canvas
    #[test]
    fn prop_fill_respects_clip(
        dest in arb_region(),
        clip in prop::option::of(arb_region()),
        color in 0u32..0x0100_0000,
    ) {
        let mut dispatcher = DisplayDispatcher::new(ColorDepth::Bpp32, 32, 32);
        let mut service = HeadlessService::new();
        if let Some(clip) = clip {
            dispatcher.apply(UiOperation::SetClip { clip }, &mut service);
        }
        let damage = dispatcher.apply(UiOperation::Rect { dest, color, rop: ROP3_PATCOPY }, &mut service);

        let expected = dest
            .intersect(&Region::new(0, 0, 32, 32))
            .and_then(|area| match clip {
                Some(clip) => area.intersect(&clip),
                None => Some(area),
            });
        prop_assert_eq!(damage, expected);

        let canvas = dispatcher.primary();
        for y in 0..32i32 {
            for x in 0..32i32 {
                let inside = expected.is_some_and(|area| {
                    x >= area.x
                        && y >= area.y
                        && x < area.x + area.width as i32
                        && y < area.y + area.height as i32
                });
                let want = if inside { 0xff00_0000 | color } else { 0xff00_0000 };
                prop_assert_eq!(canvas.pixel(i64::from(x), i64::from(y)), Some(want));
            }
        }
    }
}
