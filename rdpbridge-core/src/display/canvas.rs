//! Software drawing surface with generic raster operations

use crate::error::{PixelError, PixelResult};
use crate::pixel::{unpack_client_pixel, ColorDepth, Rgba};
use crate::ui::Region;

const OPAQUE: u32 = 0xff00_0000;

/// Evaluates a ternary raster operation on packed pixels
///
/// Bit `(p << 2) | (s << 1) | d` of `rop` gives the result for each
/// combination of pattern, source and destination bits. The result is
/// always opaque.
#[must_use]
pub const fn rop3(rop: u8, pattern: u32, source: u32, dest: u32) -> u32 {
    let mut out = 0;
    let mut index = 0;
    while index < 8 {
        if rop & (1 << index) != 0 {
            let p = if index & 4 != 0 { pattern } else { !pattern };
            let s = if index & 2 != 0 { source } else { !source };
            let d = if index & 1 != 0 { dest } else { !dest };
            out |= p & s & d;
        }
        index += 1;
    }
    out | OPAQUE
}

/// Converts channels to an opaque `0xAARRGGBB` canvas pixel
#[must_use]
pub const fn to_argb(pixel: Rgba) -> u32 {
    OPAQUE | ((pixel.red as u32) << 16) | ((pixel.green as u32) << 8) | pixel.blue as u32
}

/// Converts a client-depth color value to a canvas pixel
///
/// # Errors
///
/// Returns `UnsupportedDepth` for a client depth with no packing.
pub fn client_color(depth: ColorDepth, color: u32) -> PixelResult<u32> {
    Ok(to_argb(unpack_client_pixel(depth, color)?))
}

/// A rectangle of opaque `0xAARRGGBB` pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Canvas {
    /// Creates a black canvas
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![OPAQUE; width as usize * height as usize],
        }
    }

    /// Decodes an image payload at the client depth
    ///
    /// # Errors
    ///
    /// Returns `ShortBuffer` if `data` does not cover the image, or
    /// `UnsupportedDepth` for a depth that cannot hold images.
    pub fn from_client_pixels(
        depth: ColorDepth,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> PixelResult<Self> {
        if !depth.is_image_target() {
            return Err(PixelError::UnsupportedDepth(depth.bits()));
        }
        let bpp = depth.bytes_per_pixel();
        let count = width as usize * height as usize;
        let expected = count * bpp;
        if data.len() < expected {
            return Err(PixelError::ShortBuffer {
                expected,
                actual: data.len(),
            });
        }
        let pixels = data[..expected]
            .chunks_exact(bpp)
            .map(|px| {
                let mut word = [0u8; 4];
                word[..bpp].copy_from_slice(px);
                client_color(depth, u32::from_le_bytes(word))
            })
            .collect::<PixelResult<Vec<u32>>>()?;
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Width in pixels
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The whole canvas as a region
    #[must_use]
    pub const fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    /// Row-major pixels
    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// One pixel, `None` outside the canvas
    #[must_use]
    pub fn pixel(&self, x: i64, y: i64) -> Option<u32> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }

    /// Resizes the canvas, keeping the overlapping top-left content
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        let mut resized = Self::new(width, height);
        let keep_w = width.min(self.width) as usize;
        for y in 0..height.min(self.height) as usize {
            let src = y * self.width as usize;
            let dst = y * width as usize;
            resized.pixels[dst..dst + keep_w].copy_from_slice(&self.pixels[src..src + keep_w]);
        }
        *self = resized;
    }

    /// FNV-1a hash of the pixels, for comparing frames
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in self.pixels.iter().flat_map(|px| px.to_le_bytes()) {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash
    }

    /// Combines every pixel of `area` with `pattern` and a source pixel
    ///
    /// `area` must already lie within the canvas. Pixels for which
    /// `source` returns `None` are left untouched.
    fn combine(
        &mut self,
        area: Region,
        rop: u8,
        pattern: u32,
        mut source: impl FnMut(i64, i64) -> Option<u32>,
    ) {
        let stride = self.width as usize;
        for y in area.y..area.y + area.height as i32 {
            for x in area.x..area.x + area.width as i32 {
                let Some(src) = source(i64::from(x), i64::from(y)) else {
                    continue;
                };
                let index = y as usize * stride + x as usize;
                self.pixels[index] = rop3(rop, pattern, src, self.pixels[index]);
            }
        }
    }

    fn visible(&self, dest: Region, clip: Option<Region>) -> Option<Region> {
        let area = dest.intersect(&self.bounds())?;
        match clip {
            Some(clip) => area.intersect(&clip),
            None => Some(area),
        }
    }

    /// Fills `dest` with a solid pattern; returns the area touched
    pub fn fill(&mut self, dest: Region, clip: Option<Region>, color: u32, rop: u8) -> Option<Region> {
        let area = self.visible(dest, clip)?;
        self.combine(area, rop, color, |_, _| Some(0));
        Some(area)
    }

    /// Applies a destination-only raster op; returns the area touched
    pub fn dest_op(&mut self, dest: Region, clip: Option<Region>, rop: u8) -> Option<Region> {
        let area = self.visible(dest, clip)?;
        self.combine(area, rop, 0, |_, _| Some(0));
        Some(area)
    }

    /// Copies from `src` at `(src_x, src_y)` into `dest`; returns the area
    /// touched
    pub fn copy_from(
        &mut self,
        src: &Self,
        dest: Region,
        clip: Option<Region>,
        src_x: i32,
        src_y: i32,
        rop: u8,
    ) -> Option<Region> {
        let area = self.visible(dest, clip)?;
        let dx = i64::from(src_x) - i64::from(dest.x);
        let dy = i64::from(src_y) - i64::from(dest.y);
        self.combine(area, rop, 0, |x, y| src.pixel(x + dx, y + dy));
        Some(area)
    }

    /// Copies within this canvas; overlapping areas read the old content
    pub fn copy_within(
        &mut self,
        dest: Region,
        clip: Option<Region>,
        src_x: i32,
        src_y: i32,
        rop: u8,
    ) -> Option<Region> {
        let area = self.visible(dest, clip)?;
        let dx = i64::from(src_x) - i64::from(dest.x);
        let dy = i64::from(src_y) - i64::from(dest.y);
        // Old content of the source rectangle, clipped to the canvas
        let left = (i64::from(area.x) + dx).max(0);
        let top = (i64::from(area.y) + dy).max(0);
        let right = (i64::from(area.x) + i64::from(area.width) + dx).min(i64::from(self.width));
        let bottom =
            (i64::from(area.y) + i64::from(area.height) + dy).min(i64::from(self.height));
        if left >= right || top >= bottom {
            return Some(area);
        }
        let snapshot = self.crop(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        );
        self.combine(area, rop, 0, |x, y| snapshot.pixel(x + dx - left, y + dy - top));
        Some(area)
    }

    /// Copies a rectangle that lies within the canvas
    fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let stride = self.width as usize;
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for row in y as usize..(y + height) as usize {
            let start = row * stride + x as usize;
            pixels.extend_from_slice(&self.pixels[start..start + width as usize]);
        }
        Self { width, height, pixels }
    }
}
