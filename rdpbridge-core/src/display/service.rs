//! Services the GUI shell offers to a protocol widget

use std::fmt;

use crate::pixel::CursorImage;
use crate::ui::Region;

/// Signals a protocol widget emits towards the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolSignal {
    /// The remote session is up
    Connect,
    /// The remote session has ended
    Disconnect,
    /// The remote desktop changed size
    DesktopResize,
}

impl ProtocolSignal {
    /// Signal name as registered with the toolkit
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::DesktopResize => "desktop-resize",
        }
    }
}

impl fmt::Display for ProtocolSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shell as seen from the display side; GUI thread only
pub trait ProtocolService {
    /// Remote desktop width known to the shell
    fn width(&self) -> u32;
    /// Remote desktop height known to the shell
    fn height(&self) -> u32;
    /// Records the remote desktop width
    fn set_width(&mut self, width: u32);
    /// Records the remote desktop height
    fn set_height(&mut self, height: u32);
    /// Sets the message shown when the connection closes
    fn set_error(&mut self, message: &str);
    /// Emits a widget signal
    fn emit_signal(&mut self, signal: ProtocolSignal);
    /// Returns true once the shell has torn the widget down
    fn is_closed(&self) -> bool;
    /// Grabs the host key on the drawing area
    fn register_hostkey(&mut self);
    /// Tears the connection window down
    fn close_connection(&mut self);
    /// Invalidates an area of the drawing area, in widget coordinates
    fn queue_draw_area(&mut self, area: Region);
    /// Shows a pointer image, `None` hides the pointer
    fn set_cursor(&mut self, cursor: Option<&CursorImage>);
    /// Restores the system pointer
    fn set_default_cursor(&mut self);
}

/// Pointer state as last set through [`ProtocolService`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PointerState {
    /// System pointer
    #[default]
    Default,
    /// Pointer hidden
    Hidden,
    /// Custom image
    Image(CursorImage),
}

/// A service without a toolkit that records every call
///
/// Used by the command-line driver and by tests.
#[derive(Debug, Clone, Default)]
pub struct HeadlessService {
    /// Desktop width
    pub width: u32,
    /// Desktop height
    pub height: u32,
    /// Last error message
    pub error: Option<String>,
    /// Emitted signals in order
    pub signals: Vec<ProtocolSignal>,
    /// Set by [`ProtocolService::close_connection`]
    pub closed: bool,
    /// Set by [`ProtocolService::register_hostkey`]
    pub hostkey_registered: bool,
    /// Invalidated areas in order
    pub damage: Vec<Region>,
    /// Current pointer
    pub pointer: PointerState,
}

impl HeadlessService {
    /// Creates an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProtocolService for HeadlessService {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_width(&mut self, width: u32) {
        self.width = width;
    }

    fn set_height(&mut self, height: u32) {
        self.height = height;
    }

    fn set_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn emit_signal(&mut self, signal: ProtocolSignal) {
        self.signals.push(signal);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn register_hostkey(&mut self) {
        self.hostkey_registered = true;
    }

    fn close_connection(&mut self) {
        self.closed = true;
    }

    fn queue_draw_area(&mut self, area: Region) {
        self.damage.push(area);
    }

    fn set_cursor(&mut self, cursor: Option<&CursorImage>) {
        self.pointer = cursor.map_or(PointerState::Hidden, |c| PointerState::Image(c.clone()));
    }

    fn set_default_cursor(&mut self) {
        self.pointer = PointerState::Default;
    }
}
