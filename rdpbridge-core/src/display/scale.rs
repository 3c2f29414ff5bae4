//! Scaling the remote desktop into the widget

use crate::config::BridgeConfig;
use crate::input::PointerTransform;
use crate::ui::Region;
use crate::worker::PixelBuffer;

use super::Canvas;

/// Sizes of the desktop and of its scaled image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleGeometry {
    /// Remote desktop width
    pub desktop_width: u32,
    /// Remote desktop height
    pub desktop_height: u32,
    /// Scaled image width
    pub scale_width: u32,
    /// Scaled image height
    pub scale_height: u32,
}

impl ScaleGeometry {
    /// Computes the scaled size for a widget allocation
    ///
    /// A zero percentage fits that axis to the widget. Returns `None` when
    /// the widget is too small to scale into or the desktop is empty.
    #[must_use]
    pub fn compute(config: &BridgeConfig, widget: (u32, u32), desktop: (u32, u32)) -> Option<Self> {
        let (widget_width, widget_height) = widget;
        let (desktop_width, desktop_height) = desktop;
        if widget_width <= 1 || widget_height <= 1 || desktop_width == 0 || desktop_height == 0 {
            return None;
        }
        let axis = |percent: u32, desktop: u32, widget: u32| {
            if percent > 0 {
                (u64::from(desktop) * u64::from(percent) / 100).max(1) as u32
            } else {
                widget
            }
        };
        Some(Self {
            desktop_width,
            desktop_height,
            scale_width: axis(config.hscale, desktop_width, widget_width),
            scale_height: axis(config.vscale, desktop_height, widget_height),
        })
    }

    /// Returns true if the image is drawn at its native size
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.scale_width == self.desktop_width && self.scale_height == self.desktop_height
    }

    /// Maps a damaged desktop area to the scaled area to redraw
    ///
    /// The result is widened by a couple of scaled pixels on each side so
    /// rounding never leaves a gap.
    #[must_use]
    pub fn scale_area(&self, area: Region) -> Region {
        let (w, h) = (i64::from(self.desktop_width), i64::from(self.desktop_height));
        let (sw, sh) = (i64::from(self.scale_width), i64::from(self.scale_height));
        let (x, y) = (i64::from(area.x), i64::from(area.y));
        let (aw, ah) = (i64::from(area.width), i64::from(area.height));

        if self.is_identity() {
            let x = x.clamp(0, w - 1);
            let y = y.clamp(0, h - 1);
            return Region::new(x as i32, y as i32, (w - x).min(aw) as u32, (h - y).min(ah) as u32);
        }

        let sx = (x * sw / w - sw / w - 2).max(0).min(sw - 1);
        let sy = (y * sh / h - sh / h - 2).max(0).min(sh - 1);
        let swidth = (sw - sx).min(aw * sw / w + sw / w + 4);
        let sheight = (sh - sy).min(ah * sh / h + sh / h + 4);
        Region::new(sx as i32, sy as i32, swidth as u32, sheight as u32)
    }

    /// Pointer translation from the scaled image to the desktop
    #[must_use]
    pub const fn pointer_transform(&self) -> PointerTransform {
        PointerTransform::scaled(
            self.desktop_width,
            self.desktop_height,
            self.scale_width,
            self.scale_height,
        )
    }

    /// Redraws the scaled image of `area` from `canvas`, nearest neighbour
    ///
    /// Returns the scaled area written.
    pub fn render(&self, canvas: &Canvas, area: Region, buffer: &mut PixelBuffer) -> Region {
        let scaled = self.scale_area(area);
        let (w, h) = (u64::from(self.desktop_width), u64::from(self.desktop_height));
        let (sw, sh) = (u64::from(self.scale_width), u64::from(self.scale_height));
        for dy in scaled.y.max(0) as u32..(scaled.y.max(0) as u32 + scaled.height) {
            let src_y = u64::from(dy) * h / sh;
            for dx in scaled.x.max(0) as u32..(scaled.x.max(0) as u32 + scaled.width) {
                let src_x = u64::from(dx) * w / sw;
                if let Some(px) = canvas.pixel(src_x as i64, src_y as i64) {
                    buffer.put_pixel(dx, dy, px.to_le_bytes());
                }
            }
        }
        scaled
    }
}
