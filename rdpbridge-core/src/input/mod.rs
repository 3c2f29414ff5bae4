//! Keyboard and pointer input, GUI thread to worker
//!
//! GUI callbacks translate toolkit events into [`InputEvent`]s and push them
//! into the [`InputEventChannel`]; the worker wakes on the channel's pipe,
//! drains it and hands each event to the protocol engine as a
//! [`WireInput`].
//!
//! # Architecture
//!
//! - [`channel`]: the queue plus self-pipe shared by both threads
//! - [`keyboard`]: hardware keycode mapping and GUI-side pressed-key tracking
//! - [`pointer`]: button, wheel and scaled-coordinate translation

pub mod channel;
pub mod keyboard;
pub mod pointer;

use bitflags::bitflags;

pub use channel::{InputEventChannel, InputReceiver, InputSender, WakeHandle};
pub use keyboard::{keycode_to_scancode, translate_key, PressedKeys, Scancode};
pub use pointer::{PointerTransform, ScrollDirection};

bitflags! {
    /// Pointer event flags as sent on the wire
    ///
    /// The low nine bits carry the wheel rotation when `WHEEL` is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PointerFlags: u16 {
        /// Wheel rotation is negative
        const WHEEL_NEGATIVE = 0x0100;
        /// Vertical wheel event
        const WHEEL = 0x0200;
        /// Pointer moved
        const MOVE = 0x0800;
        /// Left button
        const BUTTON1 = 0x1000;
        /// Right button
        const BUTTON2 = 0x2000;
        /// Middle button
        const BUTTON3 = 0x4000;
        /// Button went down
        const DOWN = 0x8000;
    }
}

bitflags! {
    /// Keyboard event flags as sent on the wire
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyboardFlags: u16 {
        /// E0-prefixed scancode
        const EXTENDED = 0x0100;
        /// Key pressed
        const DOWN = 0x4000;
        /// Key released
        const RELEASE = 0x8000;
    }
}

/// Wheel rotation for one notch up
pub const WHEEL_UP_ROTATION: u16 = 0x0078;
/// Wheel rotation for one notch down, two's complement in nine bits
pub const WHEEL_DOWN_ROTATION: u16 = 0x0088;

/// A raw input event queued by the GUI thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    /// Keyboard scancode
    Scancode {
        /// True for a press, false for a release
        pressed: bool,
        /// E0-prefixed key
        extended: bool,
        /// Set-1 scancode
        code: u8,
    },
    /// Pointer motion, button or wheel
    Mouse {
        /// Wire flags, including wheel rotation bits
        flags: PointerFlags,
        /// Remote desktop column
        x: u16,
        /// Remote desktop row
        y: u16,
    },
}

/// Kind of a wire input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// `INPUT_EVENT_SCANCODE`
    Scancode,
    /// `INPUT_EVENT_MOUSE`
    Mouse,
}

impl InputKind {
    /// Message type code on the wire
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Scancode => 0x0004,
            Self::Mouse => 0x8001,
        }
    }
}

/// An input event in the shape the protocol engine sends it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireInput {
    /// Event kind
    pub kind: InputKind,
    /// Keyboard or pointer flags
    pub flags: u16,
    /// Scancode, or pointer column
    pub param1: u16,
    /// Zero, or pointer row
    pub param2: u16,
}

impl InputEvent {
    /// Creates a key press or release
    #[must_use]
    pub const fn key(scancode: Scancode, pressed: bool) -> Self {
        Self::Scancode {
            pressed,
            extended: scancode.extended,
            code: scancode.code,
        }
    }

    /// Converts the event to its wire form
    #[must_use]
    pub fn to_wire(self) -> WireInput {
        match self {
            Self::Scancode {
                pressed,
                extended,
                code,
            } => {
                let mut flags = if pressed {
                    KeyboardFlags::DOWN
                } else {
                    KeyboardFlags::RELEASE
                };
                if extended {
                    flags |= KeyboardFlags::EXTENDED;
                }
                WireInput {
                    kind: InputKind::Scancode,
                    flags: flags.bits(),
                    param1: u16::from(code),
                    param2: 0,
                }
            }
            Self::Mouse { flags, x, y } => WireInput {
                kind: InputKind::Mouse,
                flags: flags.bits(),
                param1: x,
                param2: y,
            },
        }
    }
}
