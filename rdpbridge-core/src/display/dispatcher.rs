//! Applies rendering operations on the GUI thread
//!
//! The dispatcher owns every display-side object: the primary canvas that
//! backs the visible desktop and an arena of off-screen bitmaps and
//! surfaces keyed by [`ObjectId`]. Operations naming an id the arena does
//! not hold are logged, counted and skipped.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::pixel::ColorDepth;
use crate::ui::{ObjectId, Region, UiOperation, ROP3_SRCCOPY};

use super::canvas::{client_color, Canvas};
use super::service::{ProtocolService, ProtocolSignal};

/// Display-side state driven by [`UiOperation`]s
#[derive(Debug)]
pub struct DisplayDispatcher {
    client_depth: ColorDepth,
    primary: Canvas,
    arena: HashMap<ObjectId, Canvas>,
    target: Option<ObjectId>,
    clip: Option<Region>,
    dangling: u64,
}

impl DisplayDispatcher {
    /// Creates a dispatcher with a black primary canvas
    #[must_use]
    pub fn new(client_depth: ColorDepth, width: u32, height: u32) -> Self {
        Self {
            client_depth,
            primary: Canvas::new(width, height),
            arena: HashMap::new(),
            target: None,
            clip: None,
            dangling: 0,
        }
    }

    /// The canvas backing the visible desktop
    #[must_use]
    pub const fn primary(&self) -> &Canvas {
        &self.primary
    }

    /// An off-screen bitmap or surface
    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&Canvas> {
        self.arena.get(&id)
    }

    /// Number of live off-screen objects
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.arena.len()
    }

    /// Current drawing target, `None` for the primary canvas
    #[must_use]
    pub const fn target(&self) -> Option<ObjectId> {
        self.target
    }

    /// Current clip rectangle
    #[must_use]
    pub const fn clip(&self) -> Option<Region> {
        self.clip
    }

    /// Number of operations that named an unknown object
    #[must_use]
    pub const fn dangling_references(&self) -> u64 {
        self.dangling
    }

    /// Applies one operation
    ///
    /// Returns the area of the primary canvas that changed, if any.
    pub fn apply<S: ProtocolService + ?Sized>(
        &mut self,
        op: UiOperation,
        service: &mut S,
    ) -> Option<Region> {
        match op {
            UiOperation::CreateBitmap {
                id,
                width,
                height,
                data,
            } => {
                let bitmap = Canvas::from_client_pixels(self.client_depth, width, height, &data)
                    .unwrap_or_else(|e| {
                        warn!(%id, %e, "Undecodable bitmap, using a blank one");
                        Canvas::new(width, height)
                    });
                self.arena.insert(id, bitmap);
                None
            }
            UiOperation::PaintBitmap {
                dest,
                width,
                height,
                data,
            } => match Canvas::from_client_pixels(self.client_depth, width, height, &data) {
                Ok(image) => {
                    let clip = self.clip;
                    let touched = self
                        .target_mut()?
                        .copy_from(&image, dest, clip, 0, 0, ROP3_SRCCOPY);
                    self.damage(touched)
                }
                Err(e) => {
                    warn!(%e, "Undecodable image dropped");
                    None
                }
            },
            UiOperation::DestroyBitmap { id } | UiOperation::DestroySurface { id } => {
                self.release(id);
                None
            }
            UiOperation::Rect { dest, color, rop } => {
                let color = match client_color(self.client_depth, color) {
                    Ok(color) => color,
                    Err(e) => {
                        warn!(%e, "Fill color dropped");
                        return None;
                    }
                };
                let clip = self.clip;
                let touched = self.target_mut()?.fill(dest, clip, color, rop);
                self.damage(touched)
            }
            UiOperation::DestBlt { rop, dest } => {
                let clip = self.clip;
                let touched = self.target_mut()?.dest_op(dest, clip, rop);
                self.damage(touched)
            }
            UiOperation::ScreenBlt {
                rop,
                dest,
                src_x,
                src_y,
            } => {
                let clip = self.clip;
                let touched = self
                    .target_mut()?
                    .copy_within(dest, clip, src_x, src_y, rop);
                self.damage(touched)
            }
            UiOperation::MemBlt {
                rop,
                id,
                dest,
                src_x,
                src_y,
            } => self.memblt(rop, id, dest, src_x, src_y),
            UiOperation::SetClip { clip } => {
                self.clip = Some(clip);
                None
            }
            UiOperation::ResetClip => {
                self.clip = None;
                None
            }
            UiOperation::CreateSurface {
                id,
                width,
                height,
                replaces,
            } => {
                self.arena.insert(id, Canvas::new(width, height));
                if let Some(old) = replaces {
                    let retarget = self.target == Some(old);
                    self.release(old);
                    if retarget {
                        self.target = Some(id);
                    }
                }
                None
            }
            UiOperation::SetSurface { id } => {
                self.target = match id {
                    Some(id) if !self.arena.contains_key(&id) => {
                        self.dangle(id, "set_surface");
                        None
                    }
                    other => other,
                };
                None
            }
            UiOperation::Connected { width, height } => {
                self.resize_primary(width, height, service);
                service.register_hostkey();
                service.emit_signal(ProtocolSignal::Connect);
                Some(self.primary.bounds())
            }
            UiOperation::DesktopResize { width, height } => {
                self.resize_primary(width, height, service);
                service.emit_signal(ProtocolSignal::DesktopResize);
                Some(self.primary.bounds())
            }
            UiOperation::SetCursor { cursor } => {
                service.set_cursor(cursor.as_ref());
                None
            }
            UiOperation::DefaultCursor => {
                service.set_default_cursor();
                None
            }
        }
    }

    fn memblt(
        &mut self,
        rop: u8,
        id: ObjectId,
        dest: Region,
        src_x: i32,
        src_y: i32,
    ) -> Option<Region> {
        let clip = self.clip;
        if self.target == Some(id) {
            let touched = self
                .target_mut()?
                .copy_within(dest, clip, src_x, src_y, rop);
            return self.damage(touched);
        }
        let Some(source) = self.arena.remove(&id) else {
            self.dangle(id, "memblt");
            return None;
        };
        let touched = self
            .target_mut()
            .and_then(|target| target.copy_from(&source, dest, clip, src_x, src_y, rop));
        self.arena.insert(id, source);
        self.damage(touched)
    }

    fn target_mut(&mut self) -> Option<&mut Canvas> {
        match self.target {
            None => Some(&mut self.primary),
            Some(id) => self.arena.get_mut(&id),
        }
    }

    const fn damage(&self, touched: Option<Region>) -> Option<Region> {
        match self.target {
            None => touched,
            Some(_) => None,
        }
    }

    fn release(&mut self, id: ObjectId) {
        if self.arena.remove(&id).is_none() {
            self.dangle(id, "release");
            return;
        }
        if self.target == Some(id) {
            debug!(%id, "Current target released, drawing to the desktop");
            self.target = None;
        }
    }

    fn dangle(&mut self, id: ObjectId, operation: &str) {
        warn!(%id, operation, "Unknown display object");
        self.dangling += 1;
    }

    fn resize_primary<S: ProtocolService + ?Sized>(
        &mut self,
        width: u32,
        height: u32,
        service: &mut S,
    ) {
        self.primary.resize(width, height);
        service.set_width(width);
        service.set_height(height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::service::{HeadlessService, PointerState};
    use crate::ui::{ObjectIdAllocator, ROP3_PATCOPY};

    fn setup() -> (DisplayDispatcher, HeadlessService, ObjectIdAllocator) {
        (
            DisplayDispatcher::new(ColorDepth::Bpp32, 8, 8),
            HeadlessService::new(),
            ObjectIdAllocator::new(),
        )
    }

    fn rect(dest: Region, color: u32) -> UiOperation {
        UiOperation::Rect {
            dest,
            color,
            rop: ROP3_PATCOPY,
        }
    }

    #[test]
    fn test_connected_resizes_and_signals() {
        let (mut dispatcher, mut service, _) = setup();
        let damage = dispatcher.apply(
            UiOperation::Connected {
                width: 16,
                height: 4,
            },
            &mut service,
        );
        assert_eq!(damage, Some(Region::new(0, 0, 16, 4)));
        assert_eq!((service.width, service.height), (16, 4));
        assert!(service.hostkey_registered);
        assert_eq!(service.signals, vec![ProtocolSignal::Connect]);
    }

    #[test]
    fn test_rect_on_primary_reports_damage() {
        let (mut dispatcher, mut service, _) = setup();
        let damage = dispatcher.apply(rect(Region::new(2, 2, 2, 2), 0x00ab_cdef), &mut service);
        assert_eq!(damage, Some(Region::new(2, 2, 2, 2)));
        assert_eq!(dispatcher.primary().pixel(3, 3), Some(0xffab_cdef));
    }

    #[test]
    fn test_surface_drawing_has_no_damage_until_blitted() {
        let (mut dispatcher, mut service, mut ids) = setup();
        let surface = ids.allocate();
        dispatcher.apply(
            UiOperation::CreateSurface {
                id: surface,
                width: 4,
                height: 4,
                replaces: None,
            },
            &mut service,
        );
        dispatcher.apply(UiOperation::SetSurface { id: Some(surface) }, &mut service);
        assert_eq!(
            dispatcher.apply(rect(Region::new(0, 0, 4, 4), 0x0000_ff00), &mut service),
            None
        );
        dispatcher.apply(UiOperation::SetSurface { id: None }, &mut service);
        let damage = dispatcher.apply(
            UiOperation::MemBlt {
                rop: ROP3_SRCCOPY,
                id: surface,
                dest: Region::new(4, 4, 4, 4),
                src_x: 0,
                src_y: 0,
            },
            &mut service,
        );
        assert_eq!(damage, Some(Region::new(4, 4, 4, 4)));
        assert_eq!(dispatcher.primary().pixel(5, 5), Some(0xff00_ff00));
        assert_eq!(dispatcher.primary().pixel(0, 0), Some(0xff00_0000));
        assert_eq!(dispatcher.object_count(), 1);
    }

    #[test]
    fn test_replaced_surface_is_released_and_retargeted() {
        let (mut dispatcher, mut service, mut ids) = setup();
        let first = ids.allocate();
        let second = ids.allocate();
        let create = |id, replaces| UiOperation::CreateSurface {
            id,
            width: 2,
            height: 2,
            replaces,
        };
        dispatcher.apply(create(first, None), &mut service);
        dispatcher.apply(UiOperation::SetSurface { id: Some(first) }, &mut service);
        dispatcher.apply(create(second, Some(first)), &mut service);
        assert_eq!(dispatcher.target(), Some(second));
        assert!(dispatcher.object(first).is_none());
        assert_eq!(dispatcher.object_count(), 1);
        assert_eq!(dispatcher.dangling_references(), 0);
    }

    #[test]
    fn test_destroying_target_falls_back_to_primary() {
        let (mut dispatcher, mut service, mut ids) = setup();
        let id = ids.allocate();
        dispatcher.apply(
            UiOperation::CreateSurface {
                id,
                width: 2,
                height: 2,
                replaces: None,
            },
            &mut service,
        );
        dispatcher.apply(UiOperation::SetSurface { id: Some(id) }, &mut service);
        dispatcher.apply(UiOperation::DestroySurface { id }, &mut service);
        assert_eq!(dispatcher.target(), None);
        assert!(dispatcher
            .apply(rect(Region::new(0, 0, 1, 1), 0), &mut service)
            .is_some());
    }

    #[test]
    fn test_unknown_ids_are_counted() {
        let (mut dispatcher, mut service, mut ids) = setup();
        let ghost = ids.allocate();
        dispatcher.apply(UiOperation::DestroyBitmap { id: ghost }, &mut service);
        dispatcher.apply(
            UiOperation::MemBlt {
                rop: ROP3_SRCCOPY,
                id: ghost,
                dest: Region::new(0, 0, 1, 1),
                src_x: 0,
                src_y: 0,
            },
            &mut service,
        );
        dispatcher.apply(UiOperation::SetSurface { id: Some(ghost) }, &mut service);
        assert_eq!(dispatcher.dangling_references(), 3);
        assert_eq!(dispatcher.target(), None);
    }

    #[test]
    fn test_bitmap_lifecycle() {
        let (mut dispatcher, mut service, mut ids) = setup();
        let id = ids.allocate();
        dispatcher.apply(
            UiOperation::CreateBitmap {
                id,
                width: 1,
                height: 1,
                data: vec![0x10, 0x20, 0x30, 0x00],
            },
            &mut service,
        );
        assert_eq!(dispatcher.object(id).and_then(|b| b.pixel(0, 0)), Some(0xff30_2010));
        dispatcher.apply(UiOperation::DestroyBitmap { id }, &mut service);
        assert_eq!(dispatcher.object_count(), 0);
        assert_eq!(dispatcher.dangling_references(), 0);
    }

    #[test]
    fn test_clip_limits_paint() {
        let (mut dispatcher, mut service, _) = setup();
        dispatcher.apply(
            UiOperation::SetClip {
                clip: Region::new(0, 0, 1, 1),
            },
            &mut service,
        );
        let damage = dispatcher.apply(
            UiOperation::PaintBitmap {
                dest: Region::new(0, 0, 2, 1),
                width: 2,
                height: 1,
                data: vec![0xff; 8],
            },
            &mut service,
        );
        assert_eq!(damage, Some(Region::new(0, 0, 1, 1)));
        assert_eq!(dispatcher.primary().pixel(1, 0), Some(0xff00_0000));
        dispatcher.apply(UiOperation::ResetClip, &mut service);
        assert_eq!(dispatcher.clip(), None);
    }

    #[test]
    fn test_cursor_operations_reach_service() {
        let (mut dispatcher, mut service, _) = setup();
        dispatcher.apply(UiOperation::SetCursor { cursor: None }, &mut service);
        assert_eq!(service.pointer, PointerState::Hidden);
        dispatcher.apply(UiOperation::DefaultCursor, &mut service);
        assert_eq!(service.pointer, PointerState::Default);
    }
}
