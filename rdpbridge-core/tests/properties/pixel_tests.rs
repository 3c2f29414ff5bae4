//! Property-based tests for pixel format conversion
//!
//! Tests that the bulk converters agree with the per-pixel path and that
//! packing and unpacking client pixels loses no more than the depth allows.

use proptest::prelude::*;
use rdpbridge_core::pixel::{
    convert_image, convert_image_per_pixel, convert_pixel, pack_pixel, unpack_client_pixel,
    unpack_color, ColorDepth, Palette, Rgb, Rgba,
};

/// Strategy for any server depth
fn arb_depth() -> impl Strategy<Value = ColorDepth> {
    prop::sample::select(ColorDepth::ALL.to_vec())
}

/// Strategy for a client depth that can hold images
fn arb_image_target() -> impl Strategy<Value = ColorDepth> {
    prop::sample::select(vec![
        ColorDepth::Bpp32,
        ColorDepth::Bpp24,
        ColorDepth::Bpp16,
        ColorDepth::Bpp15,
    ])
}

/// Strategy for a palette of up to 256 colors
fn arb_palette() -> impl Strategy<Value = Palette> {
    prop::collection::vec(any::<(u8, u8, u8)>(), 0..=256).prop_map(|colors| {
        let colors: Vec<Rgb> = colors.into_iter().map(|(r, g, b)| Rgb::new(r, g, b)).collect();
        Palette::from_colors(&colors)
    })
}

/// Strategy for an image at a server depth: (depth, width, height, data)
fn arb_image() -> impl Strategy<Value = (ColorDepth, u32, u32, Vec<u8>)> {
    (arb_depth(), 1u32..12, 1u32..12).prop_flat_map(|(depth, width, height)| {
        let len = depth.row_bytes(width as usize) * height as usize;
        (
            Just(depth),
            Just(width),
            Just(height),
            prop::collection::vec(any::<u8>(), len),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The bulk fast paths produce the same bytes as per-pixel conversion
    #[test]
    fn prop_bulk_conversion_matches_per_pixel(
        (server, width, height, data) in arb_image(),
        client in arb_image_target(),
        palette in arb_palette(),
    ) {
        let bulk = convert_image(server, client, &palette, width, height, &data).unwrap();
        let single = convert_image_per_pixel(server, client, &palette, width, height, &data).unwrap();
        prop_assert_eq!(bulk, single);
    }

    /// Converted images are exactly width * height client pixels
    #[test]
    fn prop_converted_image_size(
        (server, width, height, data) in arb_image(),
        client in arb_image_target(),
    ) {
        let out = convert_image(server, client, &Palette::default(), width, height, &data).unwrap();
        prop_assert_eq!(
            out.len(),
            width as usize * height as usize * client.bytes_per_pixel()
        );
    }

    /// Conversion is a pure function of its inputs
    #[test]
    fn prop_pixel_conversion_is_deterministic(
        server in arb_depth(),
        client in arb_image_target(),
        palette in arb_palette(),
        raw in any::<u32>(),
    ) {
        let first = convert_pixel(server, client, &palette, raw);
        let second = convert_pixel(server, client, &palette.clone(), raw);
        prop_assert_eq!(first, second);
    }

    /// Unpacking a packed client pixel loses at most the truncated low bits
    #[test]
    fn prop_client_pixel_round_trip_within_precision(
        client in arb_image_target(),
        red in any::<u8>(),
        green in any::<u8>(),
        blue in any::<u8>(),
    ) {
        let pixel = Rgba::opaque(red, green, blue);
        let packed = pack_pixel(client, pixel).unwrap();
        let unpacked = unpack_client_pixel(client, packed).unwrap();
        let tolerance = match client {
            ColorDepth::Bpp32 | ColorDepth::Bpp24 => 0,
            _ => 7,
        };
        prop_assert!(red.abs_diff(unpacked.red) <= tolerance);
        prop_assert!(green.abs_diff(unpacked.green) <= tolerance);
        prop_assert!(blue.abs_diff(unpacked.blue) <= tolerance);
    }

    /// A 24-bit color taken down to 16 bits and back keeps its high bits
    #[test]
    fn prop_color_round_trip_through_16_bit(raw in 0u32..0x0100_0000) {
        let palette = Palette::default();
        let narrow = convert_pixel(ColorDepth::Bpp24, ColorDepth::Bpp16, &palette, raw).unwrap();
        let wide = convert_pixel(ColorDepth::Bpp16, ColorDepth::Bpp24, &palette, narrow).unwrap();
        let source = unpack_color(ColorDepth::Bpp24, &palette, raw);
        let restored = unpack_client_pixel(ColorDepth::Bpp24, wide).unwrap();
        prop_assert_eq!(restored.red & 0xf8, source.red & 0xf8);
        prop_assert_eq!(restored.green & 0xfc, source.green & 0xfc);
        prop_assert_eq!(restored.blue & 0xf8, source.blue & 0xf8);
    }

    /// Same-depth conversion of 16-bit values is the identity
    #[test]
    fn prop_16_bit_identity(raw in 0u32..0x1_0000) {
        let out = convert_pixel(ColorDepth::Bpp16, ColorDepth::Bpp16, &Palette::default(), raw).unwrap();
        prop_assert_eq!(out, raw);
    }

    /// Short image payloads are rejected rather than read past
    #[test]
    fn prop_short_payload_rejected(
        (server, width, height, data) in arb_image(),
        client in arb_image_target(),
    ) {
        let short = &data[..data.len() - 1];
        prop_assert!(convert_image(server, client, &Palette::default(), width, height, short).is_err());
    }
}
