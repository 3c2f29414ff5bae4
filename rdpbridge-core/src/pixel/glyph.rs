//! Glyph and cursor images
//!
//! Glyphs and cursors are converted to plain RGB or RGBA rows rather than to
//! the client surface depth, because the GUI toolkit consumes them as
//! standalone images.

use super::{checked_geometry, glyph_bit, image_pixel, ColorDepth, Palette};
use crate::error::{PixelError, PixelResult};

/// An RGB or RGBA image with tightly packed rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphImage {
    width: u32,
    height: u32,
    has_alpha: bool,
    data: Vec<u8>,
}

impl GlyphImage {
    /// Image width in pixels
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Returns true if rows carry an alpha byte per pixel
    #[must_use]
    pub const fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Bytes per pixel, 3 or 4
    #[must_use]
    pub const fn channels(&self) -> usize {
        if self.has_alpha {
            4
        } else {
            3
        }
    }

    /// Bytes per row
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.width as usize * self.channels()
    }

    /// Raw pixel rows, top to bottom
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the pixel at `(x, y)` as RGB(A) bytes
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = y as usize * self.stride() + x as usize * self.channels();
        self.data.get(start..start + self.channels())
    }

    /// Mirrors the image top to bottom
    pub fn flip_vertical(&mut self) {
        let stride = self.stride();
        if stride == 0 {
            return;
        }
        let rows = self.height as usize;
        for top in 0..rows / 2 {
            let bottom = rows - 1 - top;
            let (upper, lower) = self.data.split_at_mut(bottom * stride);
            upper[top * stride..(top + 1) * stride].swap_with_slice(&mut lower[..stride]);
        }
    }
}

/// Converts a glyph or cursor bitmap into RGB or RGBA rows
///
/// 32-bit sources lose their alpha byte; when `with_alpha` is set every
/// pixel is written opaque.
///
/// # Errors
///
/// Returns `ShortBuffer` if `data` does not cover `width * height` pixels.
pub fn convert_bitmap_glyph(
    depth: ColorDepth,
    palette: &Palette,
    width: u32,
    height: u32,
    data: &[u8],
    with_alpha: bool,
) -> PixelResult<GlyphImage> {
    let (w, h, len) = checked_geometry(depth, width, height, data.len())?;
    let channels = if with_alpha { 4 } else { 3 };
    let mut out = Vec::with_capacity(w * h * channels);
    if w > 0 && h > 0 {
        for row in data[..len].chunks_exact(depth.row_bytes(w)) {
            for x in 0..w {
                let px = image_pixel(depth, palette, row, x);
                out.extend_from_slice(&[px.red, px.green, px.blue]);
                if with_alpha {
                    out.push(0xff);
                }
            }
        }
    }
    Ok(GlyphImage {
        width,
        height,
        has_alpha: with_alpha,
        data: out,
    })
}

/// Applies a monochrome AND mask to a converted glyph
///
/// Where the mask bit is set the color is inverted; every pixel ends up
/// opaque. Mask rows are packed MSB first, `(width + 7) / 8` bytes each.
///
/// # Errors
///
/// Returns `MaskTooShort` if the mask does not cover the image.
pub fn apply_mask(image: &mut GlyphImage, mask: &[u8]) -> PixelResult<()> {
    let width = image.width as usize;
    let height = image.height as usize;
    let mask_stride = ColorDepth::Bpp1.row_bytes(width);
    if mask.len() < mask_stride * height {
        return Err(PixelError::MaskTooShort {
            width: image.width,
            height: image.height,
        });
    }
    let channels = image.channels();
    let stride = image.stride();
    if stride == 0 {
        return Ok(());
    }
    for (y, row) in image.data.chunks_exact_mut(stride).enumerate() {
        let mask_row = &mask[y * mask_stride..(y + 1) * mask_stride];
        for (x, px) in row.chunks_exact_mut(channels).enumerate() {
            if glyph_bit(mask_row, x) {
                px[0] = !px[0];
                px[1] = !px[1];
                px[2] = !px[2];
            }
            if channels == 4 {
                px[3] = 0xff;
            }
        }
    }
    Ok(())
}

/// A pointer image with its hotspot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorImage {
    /// Hotspot column
    pub hotspot_x: u32,
    /// Hotspot row
    pub hotspot_y: u32,
    /// RGBA pixels, top row first
    pub image: GlyphImage,
}

/// Builds a cursor from its XOR bitmap and AND mask
///
/// Color cursors arrive bottom-up and are flipped; monochrome cursors are
/// already top-down.
///
/// # Errors
///
/// Propagates conversion and mask errors.
pub fn create_cursor(
    depth: ColorDepth,
    palette: &Palette,
    hotspot: (u32, u32),
    width: u32,
    height: u32,
    and_mask: &[u8],
    xor_data: &[u8],
) -> PixelResult<CursorImage> {
    let mut image = convert_bitmap_glyph(depth, palette, width, height, xor_data, true)?;
    apply_mask(&mut image, and_mask)?;
    if depth != ColorDepth::Bpp1 {
        image.flip_vertical();
    }
    Ok(CursorImage {
        hotspot_x: hotspot.0,
        hotspot_y: hotspot.1,
        image,
    })
}
