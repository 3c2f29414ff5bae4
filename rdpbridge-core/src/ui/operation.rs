//! Rendering commands produced by the worker
//!
//! Every operation carries only values: coordinates, raster op codes, owned
//! pixel payloads already converted to the client depth, and numeric object
//! ids naming bitmaps and surfaces that live on the display side.

use std::fmt;

use crate::pixel::CursorImage;

/// Raster op that copies the source unchanged
pub const ROP3_SRCCOPY: u8 = 0xcc;
/// Raster op that copies the pattern (solid brush) unchanged
pub const ROP3_PATCOPY: u8 = 0xf0;

/// Handle of a display-side bitmap or surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Returns the raw handle value
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out object ids, never repeating one
#[derive(Debug)]
pub struct ObjectIdAllocator {
    last: u64,
}

impl ObjectIdAllocator {
    /// Creates an allocator whose first id is 1
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Returns the next unused id
    pub fn allocate(&mut self) -> ObjectId {
        self.last += 1;
        ObjectId(self.last)
    }
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A rectangle in desktop coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Region {
    /// Creates a new region
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the area in pixels
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns true if the region covers no pixels
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the overlap of two regions, if any
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let left = i64::from(self.x).max(i64::from(other.x));
        let top = i64::from(self.y).max(i64::from(other.y));
        let right = (i64::from(self.x) + i64::from(self.width))
            .min(i64::from(other.x) + i64::from(other.width));
        let bottom = (i64::from(self.y) + i64::from(self.height))
            .min(i64::from(other.y) + i64::from(other.height));
        if right <= left || bottom <= top {
            return None;
        }
        Some(Self::new(
            left as i32,
            top as i32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// One rendering side effect, applied on the GUI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiOperation {
    /// Register an off-screen bitmap
    CreateBitmap {
        /// Handle for later references
        id: ObjectId,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Pixels at the client depth
        data: Vec<u8>,
    },
    /// Draw an image straight onto the current target
    PaintBitmap {
        /// Destination, clipped to the image size
        dest: Region,
        /// Image width
        width: u32,
        /// Image height
        height: u32,
        /// Pixels at the client depth
        data: Vec<u8>,
    },
    /// Release an off-screen bitmap
    DestroyBitmap {
        /// Bitmap handle
        id: ObjectId,
    },
    /// Fill with a solid color
    Rect {
        /// Area to fill
        dest: Region,
        /// Color at the client depth
        color: u32,
        /// Raster op, pattern = color
        rop: u8,
    },
    /// Raster op on the destination only
    DestBlt {
        /// Raster op code
        rop: u8,
        /// Affected area
        dest: Region,
    },
    /// Copy within the current target
    ScreenBlt {
        /// Raster op code
        rop: u8,
        /// Destination area
        dest: Region,
        /// Source left edge
        src_x: i32,
        /// Source top edge
        src_y: i32,
    },
    /// Copy from an off-screen bitmap or surface
    MemBlt {
        /// Raster op code
        rop: u8,
        /// Source bitmap
        id: ObjectId,
        /// Destination area
        dest: Region,
        /// Source left edge
        src_x: i32,
        /// Source top edge
        src_y: i32,
    },
    /// Restrict drawing to a rectangle
    SetClip {
        /// Clip rectangle
        clip: Region,
    },
    /// Remove the clip rectangle
    ResetClip,
    /// Create an off-screen drawing surface
    CreateSurface {
        /// Handle for the new surface
        id: ObjectId,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Surface this one supersedes, released once replaced
        replaces: Option<ObjectId>,
    },
    /// Select the drawing target, `None` is the visible desktop
    SetSurface {
        /// Surface handle
        id: Option<ObjectId>,
    },
    /// Release an off-screen surface
    DestroySurface {
        /// Surface handle
        id: ObjectId,
    },
    /// The session is up and the desktop has this size
    Connected {
        /// Desktop width
        width: u32,
        /// Desktop height
        height: u32,
    },
    /// The server changed the desktop size
    DesktopResize {
        /// Desktop width
        width: u32,
        /// Desktop height
        height: u32,
    },
    /// Show a pointer image, `None` hides the pointer
    SetCursor {
        /// Cursor image and hotspot
        cursor: Option<CursorImage>,
    },
    /// Restore the system pointer
    DefaultCursor,
}

impl UiOperation {
    /// Short name of the operation, used for logging and statistics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateBitmap { .. } => "create_bitmap",
            Self::PaintBitmap { .. } => "paint_bitmap",
            Self::DestroyBitmap { .. } => "destroy_bitmap",
            Self::Rect { .. } => "rect",
            Self::DestBlt { .. } => "destblt",
            Self::ScreenBlt { .. } => "screenblt",
            Self::MemBlt { .. } => "memblt",
            Self::SetClip { .. } => "set_clip",
            Self::ResetClip => "reset_clip",
            Self::CreateSurface { .. } => "create_surface",
            Self::SetSurface { .. } => "set_surface",
            Self::DestroySurface { .. } => "destroy_surface",
            Self::Connected { .. } => "connected",
            Self::DesktopResize { .. } => "desktop_resize",
            Self::SetCursor { .. } => "set_cursor",
            Self::DefaultCursor => "default_cursor",
        }
    }

    /// Object id this operation creates, uses or destroys
    #[must_use]
    pub const fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::CreateBitmap { id, .. }
            | Self::DestroyBitmap { id }
            | Self::MemBlt { id, .. }
            | Self::CreateSurface { id, .. }
            | Self::DestroySurface { id } => Some(*id),
            Self::SetSurface { id } => *id,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut ids = ObjectIdAllocator::new();
        let first = ids.allocate();
        let second = ids.allocate();
        assert_eq!(first.get(), 1);
        assert!(second > first);
    }

    #[test]
    fn test_region_intersect() {
        let a = Region::new(0, 0, 10, 10);
        let b = Region::new(5, -5, 10, 10);
        assert_eq!(a.intersect(&b), Some(Region::new(5, 0, 5, 5)));
        assert_eq!(a.intersect(&Region::new(10, 0, 5, 5)), None);
    }

    #[test]
    fn test_region_area() {
        assert_eq!(Region::new(3, 4, 10, 20).area(), 200);
        assert!(Region::new(0, 0, 0, 5).is_empty());
    }

    #[test]
    fn test_object_id_of_operations() {
        let mut ids = ObjectIdAllocator::new();
        let id = ids.allocate();
        let op = UiOperation::MemBlt {
            rop: ROP3_SRCCOPY,
            id,
            dest: Region::new(0, 0, 1, 1),
            src_x: 0,
            src_y: 0,
        };
        assert_eq!(op.object_id(), Some(id));
        assert_eq!(op.kind(), "memblt");
        assert_eq!(UiOperation::SetSurface { id: None }.object_id(), None);
        assert_eq!(UiOperation::ResetClip.object_id(), None);
    }
}
