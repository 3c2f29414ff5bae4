//! Keyboard scancode conversion and pressed-key tracking
//!
//! RDP uses IBM PC AT scancodes (Set 1). Keys are identified by their X11
//! hardware keycode (evdev code + 8), which is layout independent, with two
//! exceptions handled by keysym: Pause and Break have no usable make/break
//! pair of their own.

use super::InputEvent;

/// GDK keysym for Pause
pub const KEYVAL_PAUSE: u32 = 0xff13;
/// GDK keysym for Break (Ctrl+Pause)
pub const KEYVAL_BREAK: u32 = 0xff6b;

const SCANCODE_BREAK: u8 = 0xc6;
const SCANCODE_CTRL: u8 = 0x1d;
const SCANCODE_NUMLOCK: u8 = 0x45;

/// A Set-1 scancode with its E0 flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scancode {
    /// The scancode value
    pub code: u8,
    /// Whether this is an extended key (E0 prefix)
    pub extended: bool,
}

impl Scancode {
    /// Creates a new scancode
    #[must_use]
    pub const fn new(code: u8, extended: bool) -> Self {
        Self { code, extended }
    }

    /// Creates a standard (non-extended) scancode
    #[must_use]
    pub const fn standard(code: u8) -> Self {
        Self::new(code, false)
    }

    /// Creates an extended scancode (E0 prefix)
    #[must_use]
    pub const fn extended(code: u8) -> Self {
        Self::new(code, true)
    }
}

/// Converts an X11 hardware keycode to a scancode
///
/// # Example
///
/// ```
/// use rdpbridge_core::input::{keycode_to_scancode, Scancode};
///
/// assert_eq!(keycode_to_scancode(38), Some(Scancode::standard(0x1e))); // A
/// assert_eq!(keycode_to_scancode(113), Some(Scancode::extended(0x4b))); // Left
/// assert_eq!(keycode_to_scancode(300), None);
/// ```
#[must_use]
pub const fn keycode_to_scancode(keycode: u32) -> Option<Scancode> {
    match keycode {
        104 => Some(Scancode::extended(0x1c)), // KP Enter
        105 => Some(Scancode::extended(0x1d)), // Right Ctrl
        106 => Some(Scancode::extended(0x35)), // KP Divide
        107 => Some(Scancode::extended(0x37)), // Print
        108 => Some(Scancode::extended(0x38)), // Right Alt
        110 => Some(Scancode::extended(0x47)), // Home
        111 => Some(Scancode::extended(0x48)), // Up
        112 => Some(Scancode::extended(0x49)), // Page Up
        113 => Some(Scancode::extended(0x4b)), // Left
        114 => Some(Scancode::extended(0x4d)), // Right
        115 => Some(Scancode::extended(0x4f)), // End
        116 => Some(Scancode::extended(0x50)), // Down
        117 => Some(Scancode::extended(0x51)), // Page Down
        118 => Some(Scancode::extended(0x52)), // Insert
        119 => Some(Scancode::extended(0x53)), // Delete
        133 => Some(Scancode::extended(0x5b)), // Left Super
        134 => Some(Scancode::extended(0x5c)), // Right Super
        135 => Some(Scancode::extended(0x5d)), // Menu

        // Escape through F12 follow the evdev numbering, minus the unused
        // codes between KP Decimal and F11
        9..=91 | 94..=96 => Some(Scancode::standard((keycode - 8) as u8)),

        _ => None,
    }
}

/// Translates one key event into input events
///
/// Returns the events to queue and, for ordinary keys, the scancode to
/// track as pressed or released.
#[must_use]
pub fn translate_key(keyval: u32, keycode: u32, pressed: bool) -> (Vec<InputEvent>, Option<Scancode>) {
    match keyval {
        KEYVAL_BREAK => (
            vec![InputEvent::key(Scancode::standard(SCANCODE_BREAK), pressed)],
            None,
        ),
        // Pause has no release of its own; send the full sequence on press
        KEYVAL_PAUSE if pressed => {
            let ctrl = Scancode::standard(SCANCODE_CTRL);
            let numlock = Scancode::standard(SCANCODE_NUMLOCK);
            (
                vec![
                    InputEvent::key(ctrl, true),
                    InputEvent::key(numlock, true),
                    InputEvent::key(ctrl, false),
                    InputEvent::key(numlock, false),
                ],
                None,
            )
        }
        KEYVAL_PAUSE => (Vec::new(), None),
        _ => match keycode_to_scancode(keycode) {
            Some(scancode) => (vec![InputEvent::key(scancode, pressed)], Some(scancode)),
            None => {
                tracing::debug!(keyval, keycode, "Unmapped key ignored");
                (Vec::new(), None)
            }
        },
    }
}

/// Keys currently held down, owned by the GUI thread
///
/// Used to synthesize releases when the widget loses focus, so the remote
/// side never sees a modifier stuck down.
#[derive(Debug, Clone, Default)]
pub struct PressedKeys {
    keys: Vec<Scancode>,
}

impl PressedKeys {
    /// Creates an empty set
    #[must_use]
    pub const fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Records a press; auto-repeat of a held key is not recorded twice
    pub fn press(&mut self, scancode: Scancode) {
        if !self.keys.contains(&scancode) {
            self.keys.push(scancode);
        }
    }

    /// Forgets a key after its release was sent
    pub fn release(&mut self, scancode: Scancode) {
        self.keys.retain(|key| *key != scancode);
    }

    /// Returns one release event per held key and clears the set
    ///
    /// A second call with no presses in between returns nothing.
    pub fn release_all(&mut self) -> Vec<InputEvent> {
        self.keys
            .drain(..)
            .map(|scancode| InputEvent::key(scancode, false))
            .collect()
    }

    /// Number of keys held
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no key is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns true if the key is held
    #[must_use]
    pub fn contains(&self, scancode: Scancode) -> bool {
        self.keys.contains(&scancode)
    }
}
