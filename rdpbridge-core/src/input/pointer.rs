//! Pointer event translation
//!
//! Widget coordinates become remote desktop coordinates, scaled when the
//! desktop is drawn at a different size than the remote framebuffer.

use super::{InputEvent, PointerFlags, WHEEL_DOWN_ROTATION, WHEEL_UP_ROTATION};

/// Vertical scroll direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Wheel rolled away from the user
    Up,
    /// Wheel rolled towards the user
    Down,
}

/// Maps widget coordinates to remote coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerTransform {
    /// Remote desktop width
    pub remote_width: u32,
    /// Remote desktop height
    pub remote_height: u32,
    /// Width the desktop is drawn at, 0 when unscaled
    pub scale_width: u32,
    /// Height the desktop is drawn at, 0 when unscaled
    pub scale_height: u32,
}

impl PointerTransform {
    /// Identity transform for an unscaled desktop
    #[must_use]
    pub const fn unscaled(remote_width: u32, remote_height: u32) -> Self {
        Self {
            remote_width,
            remote_height,
            scale_width: 0,
            scale_height: 0,
        }
    }

    /// Transform for a desktop drawn at `scale_width` x `scale_height`
    #[must_use]
    pub const fn scaled(
        remote_width: u32,
        remote_height: u32,
        scale_width: u32,
        scale_height: u32,
    ) -> Self {
        Self {
            remote_width,
            remote_height,
            scale_width,
            scale_height,
        }
    }

    /// Translates a widget position, clamped to the remote desktop
    #[must_use]
    pub fn translate(&self, x: f64, y: f64) -> (u16, u16) {
        let x = x.max(0.0) as u64;
        let y = y.max(0.0) as u64;
        let (x, y) = if self.scale_width >= 1 && self.scale_height >= 1 {
            (
                x * u64::from(self.remote_width) / u64::from(self.scale_width),
                y * u64::from(self.remote_height) / u64::from(self.scale_height),
            )
        } else {
            (x, y)
        };
        let max_x = u64::from(self.remote_width.saturating_sub(1));
        let max_y = u64::from(self.remote_height.saturating_sub(1));
        (
            x.min(max_x).min(u64::from(u16::MAX)) as u16,
            y.min(max_y).min(u64::from(u16::MAX)) as u16,
        )
    }

    /// Pointer motion
    #[must_use]
    pub fn motion(&self, x: f64, y: f64) -> InputEvent {
        let (x, y) = self.translate(x, y);
        InputEvent::Mouse {
            flags: PointerFlags::MOVE,
            x,
            y,
        }
    }

    /// Button press or release; only the three main buttons are forwarded
    ///
    /// Toolkit button 2 is the middle button and 3 the right one, which
    /// is the reverse of the wire numbering.
    #[must_use]
    pub fn button(&self, button: u32, pressed: bool, x: f64, y: f64) -> Option<InputEvent> {
        let mut flags = match button {
            1 => PointerFlags::BUTTON1,
            2 => PointerFlags::BUTTON3,
            3 => PointerFlags::BUTTON2,
            _ => return None,
        };
        if pressed {
            flags |= PointerFlags::DOWN;
        }
        let (x, y) = self.translate(x, y);
        Some(InputEvent::Mouse { flags, x, y })
    }

    /// One wheel notch
    #[must_use]
    pub fn scroll(&self, direction: ScrollDirection, x: f64, y: f64) -> InputEvent {
        let flags = match direction {
            ScrollDirection::Up => {
                PointerFlags::WHEEL | PointerFlags::from_bits_retain(WHEEL_UP_ROTATION)
            }
            ScrollDirection::Down => {
                PointerFlags::WHEEL
                    | PointerFlags::WHEEL_NEGATIVE
                    | PointerFlags::from_bits_retain(WHEEL_DOWN_ROTATION)
            }
        };
        let (x, y) = self.translate(x, y);
        InputEvent::Mouse { flags, x, y }
    }
}
