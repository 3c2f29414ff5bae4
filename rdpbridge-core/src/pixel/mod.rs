//! Server-to-client pixel format conversion
//!
//! The server declares one of six color depths; the client surface has its
//! own native depth. Everything here is a pure function of
//! `(server depth, client depth, palette, input)`, so it can run on the
//! worker thread without touching shared state beyond a palette snapshot.
//!
//! # Bit layouts
//!
//! Two encodings of a server pixel reach this module:
//!
//! - **Color values** (solid fills): 32/24-bit values carry red in the low
//!   byte (`0x00BBGGRR`), 16/15-bit values are the usual 5-6-5 / 5-5-5
//!   words, 8-bit values index the palette.
//! - **Image data** (bitmaps, glyphs, cursors): 32/24-bit pixels are stored
//!   blue byte first, 16/15-bit pixels are little-endian words, 8-bit pixels
//!   are palette indices and 1-bit rows are packed MSB first.
//!
//! Client pixels are packed as `0xAARRGGBB` (32), `0x00RRGGBB` (24), 5-6-5
//! (16), 5-5-5 (15) or a single bit (1) and written little-endian, so a
//! 32-bit client image is laid out B, G, R, A in memory.

// Pixel math deliberately truncates to channel width
#![allow(clippy::cast_possible_truncation)]

mod glyph;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{PixelError, PixelResult};

pub use glyph::{apply_mask, convert_bitmap_glyph, create_cursor, CursorImage, GlyphImage};

/// Color depths a server may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ColorDepth {
    /// 32 bits per pixel with alpha
    Bpp32,
    /// 24 bits per pixel
    Bpp24,
    /// 16 bits per pixel, 5-6-5
    Bpp16,
    /// 15 bits per pixel, 5-5-5 in a 16-bit word
    Bpp15,
    /// 8-bit palette index
    Bpp8,
    /// Monochrome
    Bpp1,
}

impl ColorDepth {
    /// Every supported depth, highest first
    pub const ALL: [Self; 6] = [
        Self::Bpp32,
        Self::Bpp24,
        Self::Bpp16,
        Self::Bpp15,
        Self::Bpp8,
        Self::Bpp1,
    ];

    /// Returns the depth in bits
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Bpp32 => 32,
            Self::Bpp24 => 24,
            Self::Bpp16 => 16,
            Self::Bpp15 => 15,
            Self::Bpp8 => 8,
            Self::Bpp1 => 1,
        }
    }

    /// Returns the storage size of one unpacked pixel, `(bits + 7) / 8`
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        (self.bits() as usize + 7) / 8
    }

    /// Returns the number of bytes in one image row
    ///
    /// Monochrome rows are bit-packed; every other depth stores whole bytes
    /// per pixel.
    #[must_use]
    pub const fn row_bytes(self, width: usize) -> usize {
        match self {
            Self::Bpp1 => width.div_ceil(8),
            _ => width * self.bytes_per_pixel(),
        }
    }

    /// Returns true if images can be produced at this depth on the client
    #[must_use]
    pub const fn is_image_target(self) -> bool {
        matches!(self, Self::Bpp32 | Self::Bpp24 | Self::Bpp16 | Self::Bpp15)
    }
}

impl TryFrom<u8> for ColorDepth {
    type Error = PixelError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            32 => Ok(Self::Bpp32),
            24 => Ok(Self::Bpp24),
            16 => Ok(Self::Bpp16),
            15 => Ok(Self::Bpp15),
            8 => Ok(Self::Bpp8),
            1 => Ok(Self::Bpp1),
            other => Err(PixelError::UnsupportedDepth(other)),
        }
    }
}

impl From<ColorDepth> for u8 {
    fn from(depth: ColorDepth) -> Self {
        depth.bits()
    }
}

impl fmt::Display for ColorDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bpp", self.bits())
    }
}

/// An opaque RGB triple, as stored in a palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel
    pub red: u8,
    /// Green channel
    pub green: u8,
    /// Blue channel
    pub blue: u8,
}

impl Rgb {
    /// Creates a new RGB triple
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Unpacks a `0x00RRGGBB` word
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }
}

/// An unpacked pixel with 8 bits per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    /// Red channel
    pub red: u8,
    /// Green channel
    pub green: u8,
    /// Blue channel
    pub blue: u8,
    /// Alpha channel, 0xff is opaque
    pub alpha: u8,
}

impl Rgba {
    /// Opaque black
    pub const BLACK: Self = Self::opaque(0, 0, 0);
    /// Opaque white
    pub const WHITE: Self = Self::opaque(0xff, 0xff, 0xff);

    /// Creates an opaque pixel
    #[must_use]
    pub const fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 0xff,
        }
    }

    /// Returns the pixel as `[blue, green, red, alpha]`
    #[must_use]
    pub const fn to_bgra(self) -> [u8; 4] {
        [self.blue, self.green, self.red, self.alpha]
    }
}

impl From<Rgb> for Rgba {
    fn from(rgb: Rgb) -> Self {
        Self::opaque(rgb.red, rgb.green, rgb.blue)
    }
}

const PALETTE_SIZE: usize = 256;

/// A 256-entry color lookup table for indexed pixels
///
/// The table is immutable once built. Installing a new colormap replaces
/// the `Arc`, so readers holding the previous table keep a consistent view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Arc<[Rgb; PALETTE_SIZE]>,
}

impl Palette {
    /// Builds a palette from up to 256 colors, padding the rest with black
    #[must_use]
    pub fn from_colors(colors: &[Rgb]) -> Self {
        let mut entries = [Rgb::default(); PALETTE_SIZE];
        for (slot, color) in entries.iter_mut().zip(colors) {
            *slot = *color;
        }
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Returns the color for an index
    #[must_use]
    pub fn get(&self, index: u8) -> Rgb {
        self.entries[usize::from(index)]
    }

    /// Returns true if both handles point at the same table
    #[must_use]
    pub fn same_table(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

impl Default for Palette {
    /// A grayscale ramp, used until the server installs its own colormap
    fn default() -> Self {
        let mut entries = [Rgb::default(); PALETTE_SIZE];
        for (index, slot) in entries.iter_mut().enumerate() {
            let level = index as u8;
            *slot = Rgb::new(level, level, level);
        }
        Self {
            entries: Arc::new(entries),
        }
    }
}

const fn split_16(raw: u32) -> (u8, u8, u8) {
    (
        (((raw >> 8) & 0xf8) | ((raw >> 13) & 0x07)) as u8,
        (((raw >> 3) & 0xfc) | ((raw >> 9) & 0x03)) as u8,
        (((raw << 3) & 0xf8) | ((raw >> 2) & 0x07)) as u8,
    )
}

const fn split_15(raw: u32) -> (u8, u8, u8) {
    (
        (((raw >> 7) & 0xf8) | ((raw >> 12) & 0x07)) as u8,
        (((raw >> 2) & 0xf8) | ((raw >> 8) & 0x07)) as u8,
        (((raw << 3) & 0xf8) | ((raw >> 2) & 0x07)) as u8,
    )
}

/// Unpacks a server color value into channels
#[must_use]
pub fn unpack_color(depth: ColorDepth, palette: &Palette, raw: u32) -> Rgba {
    match depth {
        ColorDepth::Bpp32 => Rgba {
            red: raw as u8,
            green: (raw >> 8) as u8,
            blue: (raw >> 16) as u8,
            alpha: (raw >> 24) as u8,
        },
        ColorDepth::Bpp24 => Rgba::opaque(raw as u8, (raw >> 8) as u8, (raw >> 16) as u8),
        ColorDepth::Bpp16 => {
            let (red, green, blue) = split_16(raw);
            Rgba::opaque(red, green, blue)
        }
        ColorDepth::Bpp15 => {
            let (red, green, blue) = split_15(raw);
            Rgba::opaque(red, green, blue)
        }
        ColorDepth::Bpp8 => palette.get((raw & 0xff) as u8).into(),
        ColorDepth::Bpp1 => {
            if raw == 0 {
                Rgba::BLACK
            } else {
                Rgba::WHITE
            }
        }
    }
}

/// Packs channels into a client pixel, or `None` for a depth with no packing
#[must_use]
pub fn pack_pixel(depth: ColorDepth, pixel: Rgba) -> Option<u32> {
    let (r, g, b, a) = (
        u32::from(pixel.red),
        u32::from(pixel.green),
        u32::from(pixel.blue),
        u32::from(pixel.alpha),
    );
    match depth {
        ColorDepth::Bpp32 => Some((a << 24) | (r << 16) | (g << 8) | b),
        ColorDepth::Bpp24 => Some((r << 16) | (g << 8) | b),
        ColorDepth::Bpp16 => Some(((r >> 3) << 11) | ((g >> 2) << 5) | (b >> 3)),
        ColorDepth::Bpp15 => Some(((r >> 3) << 10) | ((g >> 3) << 5) | (b >> 3)),
        ColorDepth::Bpp1 => Some(u32::from(r != 0 || g != 0 || b != 0)),
        ColorDepth::Bpp8 => None,
    }
}

/// Unpacks a client pixel produced by [`pack_pixel`]
///
/// # Errors
///
/// Returns `UnsupportedDepth` for 8-bit clients, which have no packing.
pub fn unpack_client_pixel(depth: ColorDepth, pixel: u32) -> PixelResult<Rgba> {
    let unpacked = match depth {
        ColorDepth::Bpp32 => Rgba {
            red: (pixel >> 16) as u8,
            green: (pixel >> 8) as u8,
            blue: pixel as u8,
            alpha: (pixel >> 24) as u8,
        },
        ColorDepth::Bpp24 => Rgba::opaque((pixel >> 16) as u8, (pixel >> 8) as u8, pixel as u8),
        ColorDepth::Bpp16 => {
            let (red, green, blue) = split_16(pixel);
            Rgba::opaque(red, green, blue)
        }
        ColorDepth::Bpp15 => {
            let (red, green, blue) = split_15(pixel);
            Rgba::opaque(red, green, blue)
        }
        ColorDepth::Bpp1 => {
            if pixel == 0 {
                Rgba::BLACK
            } else {
                Rgba::WHITE
            }
        }
        ColorDepth::Bpp8 => return Err(PixelError::UnsupportedDepth(8)),
    };
    Ok(unpacked)
}

/// Converts one server color value to the client depth
///
/// # Errors
///
/// Returns `UnsupportedConversion` when the client depth has no packing.
pub fn convert_pixel(
    server: ColorDepth,
    client: ColorDepth,
    palette: &Palette,
    raw: u32,
) -> PixelResult<u32> {
    pack_pixel(client, unpack_color(server, palette, raw)).ok_or(
        PixelError::UnsupportedConversion {
            from: server.bits(),
            to: client.bits(),
        },
    )
}

/// Reads pixel `x` of one image row
pub(crate) fn image_pixel(depth: ColorDepth, palette: &Palette, row: &[u8], x: usize) -> Rgba {
    match depth {
        ColorDepth::Bpp32 => {
            let px = &row[x * 4..x * 4 + 4];
            Rgba {
                red: px[2],
                green: px[1],
                blue: px[0],
                alpha: px[3],
            }
        }
        ColorDepth::Bpp24 => {
            let px = &row[x * 3..x * 3 + 3];
            Rgba::opaque(px[2], px[1], px[0])
        }
        ColorDepth::Bpp16 | ColorDepth::Bpp15 => {
            let word = u32::from(u16::from_le_bytes([row[x * 2], row[x * 2 + 1]]));
            unpack_color(depth, palette, word)
        }
        ColorDepth::Bpp8 => palette.get(row[x]).into(),
        ColorDepth::Bpp1 => {
            if glyph_bit(row, x) {
                Rgba::WHITE
            } else {
                Rgba::BLACK
            }
        }
    }
}

/// Tests bit `x` of an MSB-first packed row
pub(crate) fn glyph_bit(row: &[u8], x: usize) -> bool {
    row[x / 8] & (0x80 >> (x % 8)) != 0
}

/// Validates geometry and returns `(width, height, source bytes)`
pub(crate) fn checked_geometry(
    depth: ColorDepth,
    width: u32,
    height: u32,
    available: usize,
) -> PixelResult<(usize, usize, usize)> {
    let invalid = PixelError::InvalidDimensions { width, height };
    let (Ok(w), Ok(h)) = (usize::try_from(width), usize::try_from(height)) else {
        return Err(invalid);
    };
    // The largest output is four bytes per pixel
    if w.checked_mul(h).and_then(|n| n.checked_mul(4)).is_none() {
        return Err(invalid);
    }
    let expected = depth.row_bytes(w) * h;
    if available < expected {
        return Err(PixelError::ShortBuffer {
            expected,
            actual: available,
        });
    }
    Ok((w, h, expected))
}

/// Converts an image from the server depth to the client depth
///
/// The returned buffer holds `width * height * client.bytes_per_pixel()`
/// bytes and is owned by the caller. Only the first
/// `server.row_bytes(width) * height` bytes of `data` are read.
///
/// # Errors
///
/// Returns `ShortBuffer` if `data` does not cover the image and
/// `UnsupportedConversion` when the client depth cannot hold images.
pub fn convert_image(
    server: ColorDepth,
    client: ColorDepth,
    palette: &Palette,
    width: u32,
    height: u32,
    data: &[u8],
) -> PixelResult<Vec<u8>> {
    if !client.is_image_target() {
        return Err(PixelError::UnsupportedConversion {
            from: server.bits(),
            to: client.bits(),
        });
    }
    let (w, h, len) = checked_geometry(server, width, height, data.len())?;
    let src = &data[..len];
    let pixels = w * h;
    let out = match (server, client) {
        (ColorDepth::Bpp24, ColorDepth::Bpp32) => bulk_24_to_32(src, pixels),
        (ColorDepth::Bpp16, ColorDepth::Bpp32) => bulk_words_to_32(src, pixels, split_16),
        (ColorDepth::Bpp15, ColorDepth::Bpp32) => bulk_words_to_32(src, pixels, split_15),
        (ColorDepth::Bpp8, ColorDepth::Bpp32 | ColorDepth::Bpp16 | ColorDepth::Bpp15) => {
            bulk_indexed(client, palette, src, pixels)
        }
        _ => return convert_image_per_pixel(server, client, palette, width, height, data),
    };
    Ok(out)
}

/// Converts an image one pixel at a time, without the bulk fast paths
///
/// Produces the same bytes as [`convert_image`] for every depth pair.
///
/// # Errors
///
/// Same as [`convert_image`].
pub fn convert_image_per_pixel(
    server: ColorDepth,
    client: ColorDepth,
    palette: &Palette,
    width: u32,
    height: u32,
    data: &[u8],
) -> PixelResult<Vec<u8>> {
    let unsupported = PixelError::UnsupportedConversion {
        from: server.bits(),
        to: client.bits(),
    };
    if !client.is_image_target() {
        return Err(unsupported);
    }
    let (w, h, len) = checked_geometry(server, width, height, data.len())?;
    let dst_bpp = client.bytes_per_pixel();
    let mut out = Vec::with_capacity(w * h * dst_bpp);
    if w == 0 || h == 0 {
        return Ok(out);
    }
    for row in data[..len].chunks_exact(server.row_bytes(w)) {
        for x in 0..w {
            let packed = pack_pixel(client, image_pixel(server, palette, row, x))
                .ok_or_else(|| unsupported.clone())?;
            out.extend_from_slice(&packed.to_le_bytes()[..dst_bpp]);
        }
    }
    Ok(out)
}

fn bulk_24_to_32(src: &[u8], pixels: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels * 4);
    for px in src.chunks_exact(3) {
        out.extend_from_slice(&[px[0], px[1], px[2], 0xff]);
    }
    out
}

fn bulk_words_to_32(src: &[u8], pixels: usize, split: fn(u32) -> (u8, u8, u8)) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels * 4);
    for px in src.chunks_exact(2) {
        let (red, green, blue) = split(u32::from(u16::from_le_bytes([px[0], px[1]])));
        out.extend_from_slice(&[blue, green, red, 0xff]);
    }
    out
}

fn bulk_indexed(client: ColorDepth, palette: &Palette, src: &[u8], pixels: usize) -> Vec<u8> {
    let dst_bpp = client.bytes_per_pixel();
    let mut table = [[0u8; 4]; PALETTE_SIZE];
    for (index, slot) in table.iter_mut().enumerate() {
        let rgba = Rgba::from(palette.get(index as u8));
        if let Some(packed) = pack_pixel(client, rgba) {
            *slot = packed.to_le_bytes();
        }
    }
    let mut out = Vec::with_capacity(pixels * dst_bpp);
    for &index in src {
        out.extend_from_slice(&table[usize::from(index)][..dst_bpp]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Palette {
        let colors: Vec<Rgb> = (0..=255u8)
            .map(|i| Rgb::new(i, i.wrapping_mul(3), 255 - i))
            .collect();
        Palette::from_colors(&colors)
    }

    #[test]
    fn test_depth_sizes() {
        assert_eq!(ColorDepth::Bpp32.bytes_per_pixel(), 4);
        assert_eq!(ColorDepth::Bpp24.bytes_per_pixel(), 3);
        assert_eq!(ColorDepth::Bpp15.bytes_per_pixel(), 2);
        assert_eq!(ColorDepth::Bpp1.bytes_per_pixel(), 1);
        assert_eq!(ColorDepth::Bpp1.row_bytes(9), 2);
        assert_eq!(ColorDepth::Bpp24.row_bytes(5), 15);
    }

    #[test]
    fn test_depth_try_from() {
        for depth in ColorDepth::ALL {
            assert_eq!(ColorDepth::try_from(depth.bits()), Ok(depth));
        }
        assert_eq!(
            ColorDepth::try_from(12),
            Err(PixelError::UnsupportedDepth(12))
        );
    }

    #[test]
    fn test_unpack_16_bit_white_and_primaries() {
        let pal = Palette::default();
        assert_eq!(unpack_color(ColorDepth::Bpp16, &pal, 0xffff), Rgba::WHITE);
        assert_eq!(
            unpack_color(ColorDepth::Bpp16, &pal, 0xf800),
            Rgba::opaque(0xff, 0, 0)
        );
        assert_eq!(
            unpack_color(ColorDepth::Bpp16, &pal, 0x07e0),
            Rgba::opaque(0, 0xff, 0)
        );
        assert_eq!(
            unpack_color(ColorDepth::Bpp16, &pal, 0x001f),
            Rgba::opaque(0, 0, 0xff)
        );
    }

    #[test]
    fn test_unpack_24_bit_color_value_is_bgr() {
        let pal = Palette::default();
        let px = unpack_color(ColorDepth::Bpp24, &pal, 0x00_33_22_11);
        assert_eq!(px, Rgba::opaque(0x11, 0x22, 0x33));
    }

    #[test]
    fn test_indexed_uses_low_byte_only() {
        let pal = palette();
        assert_eq!(
            unpack_color(ColorDepth::Bpp8, &pal, 0x1234),
            Rgba::from(pal.get(0x34))
        );
    }

    #[test]
    fn test_convert_pixel_to_client_layouts() {
        let pal = Palette::default();
        let raw = 0x00_30_20_10; // r=0x10 g=0x20 b=0x30
        assert_eq!(
            convert_pixel(ColorDepth::Bpp24, ColorDepth::Bpp32, &pal, raw),
            Ok(0xff10_2030)
        );
        assert_eq!(
            convert_pixel(ColorDepth::Bpp24, ColorDepth::Bpp24, &pal, raw),
            Ok(0x0010_2030)
        );
        assert_eq!(
            convert_pixel(ColorDepth::Bpp24, ColorDepth::Bpp16, &pal, raw),
            Ok((0x10 >> 3 << 11) | (0x20 >> 2 << 5) | (0x30 >> 3))
        );
        assert_eq!(
            convert_pixel(ColorDepth::Bpp1, ColorDepth::Bpp1, &pal, 5),
            Ok(1)
        );
    }

    #[test]
    fn test_convert_pixel_to_indexed_client_fails() {
        let err = convert_pixel(ColorDepth::Bpp16, ColorDepth::Bpp8, &Palette::default(), 0);
        assert_eq!(
            err,
            Err(PixelError::UnsupportedConversion { from: 16, to: 8 })
        );
    }

    #[test]
    fn test_convert_image_16_to_32() {
        // 2x2: red, green, blue, white
        let data = [0x00, 0xf8, 0xe0, 0x07, 0x1f, 0x00, 0xff, 0xff];
        let out = convert_image(
            ColorDepth::Bpp16,
            ColorDepth::Bpp32,
            &Palette::default(),
            2,
            2,
            &data,
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                0, 0, 0xff, 0xff, //
                0, 0xff, 0, 0xff, //
                0xff, 0, 0, 0xff, //
                0xff, 0xff, 0xff, 0xff,
            ]
        );
    }

    #[test]
    fn test_convert_image_ignores_trailing_bytes() {
        let data = [1u8, 2, 3, 9, 9, 9];
        let out = convert_image(
            ColorDepth::Bpp24,
            ColorDepth::Bpp32,
            &Palette::default(),
            1,
            1,
            &data,
        )
        .unwrap();
        assert_eq!(out, vec![1, 2, 3, 0xff]);
    }

    #[test]
    fn test_convert_image_short_buffer() {
        let err = convert_image(
            ColorDepth::Bpp16,
            ColorDepth::Bpp32,
            &Palette::default(),
            4,
            4,
            &[0u8; 31],
        );
        assert_eq!(
            err,
            Err(PixelError::ShortBuffer {
                expected: 32,
                actual: 31
            })
        );
    }

    #[test]
    fn test_bulk_paths_match_per_pixel() {
        let pal = palette();
        let data: Vec<u8> = (0..96u32).map(|i| (i * 37 + 11) as u8).collect();
        let pairs = [
            (ColorDepth::Bpp24, ColorDepth::Bpp32),
            (ColorDepth::Bpp16, ColorDepth::Bpp32),
            (ColorDepth::Bpp15, ColorDepth::Bpp32),
            (ColorDepth::Bpp8, ColorDepth::Bpp32),
            (ColorDepth::Bpp8, ColorDepth::Bpp16),
            (ColorDepth::Bpp8, ColorDepth::Bpp15),
        ];
        for (server, client) in pairs {
            let bulk = convert_image(server, client, &pal, 4, 4, &data).unwrap();
            let slow = convert_image_per_pixel(server, client, &pal, 4, 4, &data).unwrap();
            assert_eq!(bulk, slow, "{server} -> {client}");
        }
    }

    #[test]
    fn test_monochrome_image_rows_are_packed() {
        // 10 pixels wide: two bytes per row, only the first and last bit set
        let data = [0x80, 0x40];
        let out = convert_image(
            ColorDepth::Bpp1,
            ColorDepth::Bpp24,
            &Palette::default(),
            10,
            1,
            &data,
        )
        .unwrap();
        assert_eq!(out.len(), 30);
        assert_eq!(&out[..3], &[0xff, 0xff, 0xff]);
        assert_eq!(&out[3..6], &[0, 0, 0]);
        assert_eq!(&out[27..30], &[0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_palette_from_colors_pads_and_truncates() {
        let pal = Palette::from_colors(&[Rgb::new(1, 2, 3)]);
        assert_eq!(pal.get(0), Rgb::new(1, 2, 3));
        assert_eq!(pal.get(255), Rgb::default());

        let many = vec![Rgb::new(9, 9, 9); 300];
        let pal = Palette::from_colors(&many);
        assert_eq!(pal.get(255), Rgb::new(9, 9, 9));
    }

    #[test]
    fn test_palette_clone_shares_table() {
        let pal = palette();
        let copy = pal.clone();
        assert!(pal.same_table(&copy));
        assert!(!pal.same_table(&palette()));
    }
}
