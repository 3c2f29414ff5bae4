//! GUI-thread side of one connection
//!
//! A [`DisplaySession`] is woken through the [`GuiWaker`] given to the
//! worker. Each wake drains the UI queue into the dispatcher, presents the
//! damage, and handles the worker's final close notification. Keyboard and
//! pointer events from the widget go the other way, into the input channel.
//!
//! [`GuiWaker`]: crate::ui::GuiWaker

use std::sync::mpsc::TryRecvError;

use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::input::{translate_key, PointerTransform, PressedKeys, ScrollDirection};
use crate::ui::{Region, UiOperation};
use crate::worker::{ControlSignal, DisplayLink, PixelBuffer, WorkerExit};

use super::canvas::Canvas;
use super::dispatcher::DisplayDispatcher;
use super::scale::ScaleGeometry;
use super::service::{ProtocolService, ProtocolSignal};

/// What a repaint draws from
#[derive(Debug)]
pub enum Frame<'a> {
    /// The desktop at its native size
    Desktop(&'a Canvas),
    /// The scaled image, read under the render lock
    Scaled(&'a PixelBuffer),
}

/// Display state and widget event handling for one connection
pub struct DisplaySession<S: ProtocolService> {
    config: BridgeConfig,
    service: S,
    dispatcher: DisplayDispatcher,
    link: DisplayLink,
    keys: PressedKeys,
    widget: (u32, u32),
    scale: Option<ScaleGeometry>,
    rescale_pending: bool,
    exit: Option<WorkerExit>,
}

impl<S: ProtocolService> DisplaySession<S> {
    /// Binds the GUI ends of a spawned worker to a shell service
    pub fn new(config: BridgeConfig, link: DisplayLink, service: S) -> Self {
        let dispatcher = DisplayDispatcher::new(config.client_depth, config.width, config.height);
        Self {
            config,
            service,
            dispatcher,
            link,
            keys: PressedKeys::new(),
            widget: (0, 0),
            scale: None,
            rescale_pending: false,
            exit: None,
        }
    }

    /// Configuration the session was started with
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// The shell service
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// The shell service, mutably
    pub fn service_mut(&mut self) -> &mut S {
        &mut self.service
    }

    /// The dispatcher and its canvases
    pub const fn dispatcher(&self) -> &DisplayDispatcher {
        &self.dispatcher
    }

    /// The worker's final report, once it has closed
    pub const fn exit(&self) -> Option<&WorkerExit> {
        self.exit.as_ref()
    }

    /// Current scale geometry, `None` when drawing unscaled
    pub const fn scale(&self) -> Option<ScaleGeometry> {
        self.scale
    }

    /// Keys currently held
    pub const fn pressed_keys(&self) -> &PressedKeys {
        &self.keys
    }

    /// Returns true once the connection is gone
    pub fn is_closed(&self) -> bool {
        self.exit.is_some() || self.service.is_closed()
    }

    /// Handles one wake-up from the worker
    ///
    /// Returns the number of operations applied.
    pub fn on_wake(&mut self) -> usize {
        let mut applied = self.drain();
        loop {
            match self.link.control.try_recv() {
                Ok(ControlSignal::Closed(exit)) => applied += self.close(exit),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    fn drain(&mut self) -> usize {
        let mut damage = Vec::new();
        let mut resized = false;
        let dispatcher = &mut self.dispatcher;
        let service = &mut self.service;
        let applied = self.link.ui.drain_into(|op| {
            resized |= matches!(
                op,
                UiOperation::Connected { .. } | UiOperation::DesktopResize { .. }
            );
            if let Some(area) = dispatcher.apply(op, service) {
                damage.push(area);
            }
        });
        if resized && self.config.scale {
            self.rescale();
        }
        for area in damage {
            self.present(area);
        }
        applied
    }

    fn close(&mut self, exit: WorkerExit) -> usize {
        if self.exit.is_some() {
            return 0;
        }
        // Operations queued before the close notification still apply
        let applied = self.drain();
        if let Some(message) = &exit.error {
            self.service.set_error(message);
        }
        info!(reason = ?exit.reason, "Connection closed");
        self.service.emit_signal(ProtocolSignal::Disconnect);
        self.service.close_connection();
        self.exit = Some(exit);
        applied
    }

    fn present(&mut self, area: Region) {
        let Some(geometry) = self.scale else {
            self.service.queue_draw_area(area);
            return;
        };
        let scaled = {
            let mut cache = self.link.shared.render().lock();
            match cache.scaled_mut() {
                Some(buffer) => geometry.render(self.dispatcher.primary(), area, buffer),
                None => geometry.scale_area(area),
            }
        };
        self.service.queue_draw_area(scaled);
    }

    /// Records a new widget allocation
    ///
    /// Returns true if the caller should arm the settle timer for
    /// [`BridgeConfig::scale_settle`] and then call
    /// [`DisplaySession::scale_timer_fired`].
    pub fn configure(&mut self, width: u32, height: u32) -> bool {
        self.widget = (width, height);
        if !self.config.scale {
            return false;
        }
        self.rescale_pending = true;
        true
    }

    /// Returns true while a resize waits for the settle timer
    pub const fn is_rescale_pending(&self) -> bool {
        self.rescale_pending
    }

    /// Rebuilds the scaled image after the widget settled
    pub fn scale_timer_fired(&mut self) {
        self.rescale_pending = false;
        self.rescale();
    }

    fn rescale(&mut self) {
        if !self.config.scale {
            return;
        }
        let canvas = self.dispatcher.primary();
        let Some(geometry) =
            ScaleGeometry::compute(&self.config, self.widget, (canvas.width(), canvas.height()))
        else {
            debug!(widget = ?self.widget, "Widget too small to scale into");
            return;
        };
        {
            let mut cache = self.link.shared.render().lock();
            let mut buffer = PixelBuffer::new(geometry.scale_width, geometry.scale_height);
            geometry.render(canvas, canvas.bounds(), &mut buffer);
            cache.replace_scaled(Some(buffer));
        }
        debug!(
            width = geometry.scale_width,
            height = geometry.scale_height,
            "Scaled image rebuilt"
        );
        self.scale = Some(geometry);
        self.service.queue_draw_area(Region::new(
            0,
            0,
            geometry.scale_width,
            geometry.scale_height,
        ));
    }

    /// Draws the current image through `paint`
    pub fn repaint<R>(&self, paint: impl FnOnce(Frame<'_>) -> R) -> R {
        if self.scale.is_some() {
            let cache = self.link.shared.render().lock();
            if let Some(buffer) = cache.scaled() {
                return paint(Frame::Scaled(buffer));
            }
        }
        paint(Frame::Desktop(self.dispatcher.primary()))
    }

    /// Widget-to-desktop pointer translation in effect
    pub fn pointer_transform(&self) -> PointerTransform {
        self.scale.map_or_else(
            || {
                let canvas = self.dispatcher.primary();
                PointerTransform::unscaled(canvas.width(), canvas.height())
            },
            |geometry| geometry.pointer_transform(),
        )
    }

    /// Key pressed in the widget
    pub fn key_press(&mut self, keyval: u32, keycode: u32) {
        self.key(keyval, keycode, true);
    }

    /// Key released in the widget
    pub fn key_release(&mut self, keyval: u32, keycode: u32) {
        self.key(keyval, keycode, false);
    }

    fn key(&mut self, keyval: u32, keycode: u32, pressed: bool) {
        if self.is_closed() {
            return;
        }
        let (events, scancode) = translate_key(keyval, keycode, pressed);
        if let Some(scancode) = scancode {
            if pressed {
                self.keys.press(scancode);
            } else {
                self.keys.release(scancode);
            }
        }
        self.link.input.push_all(events);
    }

    /// The widget lost keyboard focus
    pub fn focus_out(&mut self) {
        if self.is_closed() || !self.config.release_keys_on_unfocus {
            return;
        }
        let releases = self.keys.release_all();
        if !releases.is_empty() {
            debug!(count = releases.len(), "Releasing held keys");
            self.link.input.push_all(releases);
        }
    }

    /// Pointer moved over the widget
    pub fn pointer_motion(&mut self, x: f64, y: f64) {
        if self.is_closed() {
            return;
        }
        let event = self.pointer_transform().motion(x, y);
        self.link.input.push(event);
    }

    /// Pointer button pressed or released
    pub fn pointer_button(&mut self, button: u32, pressed: bool, x: f64, y: f64) {
        if self.is_closed() {
            return;
        }
        if let Some(event) = self.pointer_transform().button(button, pressed, x, y) {
            self.link.input.push(event);
        }
    }

    /// Wheel notch over the widget
    pub fn scroll(&mut self, direction: ScrollDirection, x: f64, y: f64) {
        if self.is_closed() {
            return;
        }
        let event = self.pointer_transform().scroll(direction, x, y);
        self.link.input.push(event);
    }
}

impl<S: ProtocolService> std::fmt::Debug for DisplaySession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplaySession")
            .field("widget", &self.widget)
            .field("scale", &self.scale)
            .field("exit", &self.exit)
            .finish_non_exhaustive()
    }
}
