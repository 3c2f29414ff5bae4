//! Render state shared between the worker and the GUI thread
//!
//! This module contains the `PixelBuffer` holding the scaled desktop image
//! and the mutex-guarded `RenderCache` it lives in, together with the
//! installed palette and the current desktop geometry.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cancel::CancelScope;
use crate::pixel::Palette;

/// Scaled desktop image
///
/// Holds BGRA pixels written by the display side after each damaged area
/// is rescaled, and read by the repaint handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Raw pixel data in BGRA format
    data: Vec<u8>,
    /// Buffer width in pixels
    width: u32,
    /// Buffer height in pixels
    height: u32,
    /// Whether any area has been written since allocation
    has_data: bool,
}

impl PixelBuffer {
    /// Creates a black buffer with the specified dimensions
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let size = width as usize * height as usize * 4;
        Self {
            data: vec![0; size],
            width,
            height,
            has_data: false,
        }
    }

    /// Returns the buffer width
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Returns the buffer height
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns the stride (bytes per row)
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Returns whether the buffer has received any data
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.has_data
    }

    /// Returns the raw pixel data
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the BGRA bytes of one pixel
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * 4;
        let mut px = [0; 4];
        px.copy_from_slice(&self.data[offset..offset + 4]);
        Some(px)
    }

    /// Writes one pixel, ignoring positions outside the buffer
    pub fn put_pixel(&mut self, x: u32, y: u32, bgra: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = y as usize * self.stride() + x as usize * 4;
        self.data[offset..offset + 4].copy_from_slice(&bgra);
        self.has_data = true;
    }

    /// Clears the buffer to black
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.has_data = false;
    }
}

/// State touched by both threads, only ever behind [`RenderState`]'s lock
#[derive(Debug, Clone)]
pub struct RenderCache {
    palette: Palette,
    scaled: Option<PixelBuffer>,
    desktop_width: u32,
    desktop_height: u32,
}

impl RenderCache {
    /// Creates a cache for a desktop of the given size, with the default
    /// palette and no scale buffer
    #[must_use]
    pub fn new(desktop_width: u32, desktop_height: u32) -> Self {
        Self {
            palette: Palette::default(),
            scaled: None,
            desktop_width,
            desktop_height,
        }
    }

    /// The installed palette
    #[must_use]
    pub const fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Installs a new palette, returning the previous one
    ///
    /// Readers holding a clone of the old table keep seeing it unchanged.
    pub fn replace_palette(&mut self, palette: Palette) -> Palette {
        std::mem::replace(&mut self.palette, palette)
    }

    /// Current desktop size
    #[must_use]
    pub const fn desktop_size(&self) -> (u32, u32) {
        (self.desktop_width, self.desktop_height)
    }

    /// Records a new desktop size
    pub fn set_desktop_size(&mut self, width: u32, height: u32) {
        self.desktop_width = width;
        self.desktop_height = height;
    }

    /// The scale buffer, if scaling is active
    #[must_use]
    pub const fn scaled(&self) -> Option<&PixelBuffer> {
        self.scaled.as_ref()
    }

    /// Mutable access to the scale buffer
    pub fn scaled_mut(&mut self) -> Option<&mut PixelBuffer> {
        self.scaled.as_mut()
    }

    /// Swaps in a new scale buffer, or drops it when scaling is turned off
    pub fn replace_scaled(&mut self, buffer: Option<PixelBuffer>) -> Option<PixelBuffer> {
        std::mem::replace(&mut self.scaled, buffer)
    }
}

/// The mutex around [`RenderCache`]
#[derive(Debug)]
pub struct RenderState {
    cache: Mutex<RenderCache>,
}

impl RenderState {
    /// Wraps a cache
    #[must_use]
    pub const fn new(cache: RenderCache) -> Self {
        Self {
            cache: Mutex::new(cache),
        }
    }

    /// Locks the cache from the GUI thread
    pub fn lock(&self) -> MutexGuard<'_, RenderCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the cache from the worker, only possible while cancellation
    /// is deferred
    pub fn lock_deferred<'a>(&'a self, scope: &'a CancelScope) -> MutexGuard<'a, RenderCache> {
        scope.lock(&self.cache)
    }
}
