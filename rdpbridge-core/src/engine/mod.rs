//! Protocol engine contract
//!
//! The remote protocol itself is an external collaborator. The worker only
//! needs three things from it: the descriptors it wants to wait on, a
//! `check_fds` entry point that processes whatever became ready, and a way
//! to send input. While checking, the engine reports rendering through the
//! [`RenderSink`] it is handed; each render callback converts pixels to the
//! client depth and enqueues exactly one [`UiOperation`].
//!
//! Side channels (clipboard, audio and so on) sit behind a separate
//! [`ChannelManager`] with the same descriptor shape.

pub mod scripted;

use std::os::fd::{AsRawFd, BorrowedFd, RawFd};

use nix::errno::Errno;
use nix::sys::select::{select, FdSet, FD_SETSIZE};
use tracing::{trace, warn};

use crate::cancel::CancelScope;
use crate::error::EngineError;
use crate::input::WireInput;
use crate::pixel::{self, ColorDepth, CursorImage, Palette, Rgb};
use crate::ui::{ObjectId, ObjectIdAllocator, Region, UiOperation, UiProducer};
use crate::worker::{RenderCache, RenderState};

pub use scripted::{RenderHook, ScriptFeeder, ScriptStep, ScriptedEngine};

/// Who registered a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdSource {
    /// The protocol engine's own connection
    Engine,
    /// The side-channel manager
    Channels,
    /// The input wake-up pipe
    Wake,
}

#[derive(Debug, Clone, Copy)]
struct FdEntry<'fd> {
    source: FdSource,
    fd: BorrowedFd<'fd>,
    write: bool,
}

/// Descriptors to wait on for one loop iteration
///
/// Rebuilt from scratch every iteration, since engines add and remove
/// channels while connected.
#[derive(Debug)]
pub struct FdInterest<'fd> {
    source: FdSource,
    entries: Vec<FdEntry<'fd>>,
}

/// Which sources became ready in one wait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// An engine descriptor is ready
    pub engine: bool,
    /// A channel manager descriptor is ready
    pub channels: bool,
    /// The input pipe is readable
    pub wake: bool,
}

impl<'fd> FdInterest<'fd> {
    /// Creates an empty set, attributing new descriptors to the engine
    #[must_use]
    pub const fn new() -> Self {
        Self {
            source: FdSource::Engine,
            entries: Vec::new(),
        }
    }

    /// Attributes descriptors added from now on to `source`
    pub fn set_source(&mut self, source: FdSource) {
        self.source = source;
    }

    /// Waits for `fd` to become readable
    pub fn read(&mut self, fd: BorrowedFd<'fd>) {
        self.entries.push(FdEntry {
            source: self.source,
            fd,
            write: false,
        });
    }

    /// Waits for `fd` to become writable
    pub fn write(&mut self, fd: BorrowedFd<'fd>) {
        self.entries.push(FdEntry {
            source: self.source,
            fd,
            write: true,
        });
    }

    /// Number of registered descriptors
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of descriptors registered by one source
    #[must_use]
    pub fn count(&self, source: FdSource) -> usize {
        self.entries.iter().filter(|e| e.source == source).count()
    }

    /// The first descriptor `select` cannot watch, with its source
    #[must_use]
    pub fn beyond_select_limit(&self) -> Option<(FdSource, RawFd)> {
        self.entries
            .iter()
            .map(|entry| (entry.source, entry.fd.as_raw_fd()))
            .find(|&(_, fd)| !within_select_limit(fd))
    }

    /// Blocks until at least one descriptor is ready, without a timeout
    ///
    /// # Errors
    ///
    /// Returns the `select` errno, including `EINTR`, and `EBADF` for a
    /// descriptor at or above `FD_SETSIZE`.
    pub fn wait(&self) -> Result<Readiness, Errno> {
        if self.beyond_select_limit().is_some() {
            return Err(Errno::EBADF);
        }
        let mut read_set = FdSet::new();
        let mut write_set = FdSet::new();
        for entry in &self.entries {
            if entry.write {
                write_set.insert(entry.fd);
            } else {
                read_set.insert(entry.fd);
            }
        }
        select(None, &mut read_set, &mut write_set, None, None)?;

        let mut ready = Readiness::default();
        for entry in &self.entries {
            let set = if entry.write { &write_set } else { &read_set };
            if set.contains(entry.fd) {
                match entry.source {
                    FdSource::Engine => ready.engine = true,
                    FdSource::Channels => ready.channels = true,
                    FdSource::Wake => ready.wake = true,
                }
            }
        }
        trace!(?ready, "Descriptors ready");
        Ok(ready)
    }
}

fn within_select_limit(fd: RawFd) -> bool {
    usize::try_from(fd).is_ok_and(|fd| fd < FD_SETSIZE)
}

impl Default for FdInterest<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// A remote desktop protocol engine driven by the worker thread
pub trait ProtocolEngine: Send {
    /// Registers the descriptors the engine currently waits on
    ///
    /// # Errors
    ///
    /// A failure here ends the connection.
    fn get_fds<'fd>(&'fd self, interest: &mut FdInterest<'fd>) -> Result<(), EngineError>;

    /// Processes ready descriptors, reporting rendering through `sink`
    ///
    /// # Errors
    ///
    /// A failure here ends the connection.
    fn check_fds(&mut self, sink: &mut RenderSink<'_>) -> Result<(), EngineError>;

    /// Sends one input event to the server
    fn send_input(&mut self, input: WireInput);

    /// Starts a clean disconnect
    fn request_disconnect(&mut self);

    /// Returns true once the engine wants the connection to end
    fn shall_disconnect(&self) -> bool;
}

/// Side-channel multiplexer layered above the engine
pub trait ChannelManager: Send {
    /// Registers the descriptors the channels currently wait on
    ///
    /// # Errors
    ///
    /// A failure here ends the connection.
    fn get_fds<'fd>(&'fd self, interest: &mut FdInterest<'fd>) -> Result<(), EngineError>;

    /// Services ready channel descriptors
    ///
    /// # Errors
    ///
    /// A failure here ends the connection.
    fn check_fds(&mut self) -> Result<(), EngineError>;
}

/// A connection without side channels
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChannels;

impl ChannelManager for NoChannels {
    fn get_fds<'fd>(&'fd self, _interest: &mut FdInterest<'fd>) -> Result<(), EngineError> {
        Ok(())
    }

    fn check_fds(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Callback surface handed to [`ProtocolEngine::check_fds`]
///
/// Lives for one check on the worker thread. Pixel data is converted from
/// the server depth to the client depth here, before it crosses to the GUI
/// thread. A conversion failure is logged and the operation dropped; the
/// connection carries on.
pub struct RenderSink<'a> {
    render: &'a RenderState,
    scope: &'a CancelScope,
    ui: &'a UiProducer,
    ids: &'a mut ObjectIdAllocator,
    server_depth: ColorDepth,
    client_depth: ColorDepth,
}

impl<'a> RenderSink<'a> {
    /// Creates a sink for one `check_fds` call
    pub fn new(
        render: &'a RenderState,
        scope: &'a CancelScope,
        ui: &'a UiProducer,
        ids: &'a mut ObjectIdAllocator,
        server_depth: ColorDepth,
        client_depth: ColorDepth,
    ) -> Self {
        Self {
            render,
            scope,
            ui,
            ids,
            server_depth,
            client_depth,
        }
    }

    /// Depth of pixel data coming from the server
    #[must_use]
    pub const fn server_depth(&self) -> ColorDepth {
        self.server_depth
    }

    /// Depth of pixel data handed to the display
    #[must_use]
    pub const fn client_depth(&self) -> ColorDepth {
        self.client_depth
    }

    /// Runs `f` with the render cache locked
    ///
    /// Cancellation requested meanwhile takes effect only after `f`
    /// returns and the worker reaches its next checkpoint.
    pub fn with_render_cache<R>(&mut self, f: impl FnOnce(&mut RenderCache) -> R) -> R {
        let mut cache = self.render.lock_deferred(self.scope);
        f(&mut cache)
    }

    fn palette(&self) -> Palette {
        self.render.lock_deferred(self.scope).palette().clone()
    }

    fn convert(&self, width: u32, height: u32, data: &[u8]) -> Option<Vec<u8>> {
        pixel::convert_image(
            self.server_depth,
            self.client_depth,
            &self.palette(),
            width,
            height,
            data,
        )
        .map_err(|e| warn!(%e, width, height, "Dropping image with unsupported format"))
        .ok()
    }

    /// Registers an off-screen bitmap
    ///
    /// Returns `None` when the image could not be converted.
    pub fn create_bitmap(&mut self, width: u32, height: u32, data: &[u8]) -> Option<ObjectId> {
        let data = self.convert(width, height, data)?;
        let id = self.ids.allocate();
        self.ui.push(UiOperation::CreateBitmap {
            id,
            width,
            height,
            data,
        });
        Some(id)
    }

    /// Draws an image onto the current target
    pub fn paint_bitmap(&mut self, x: i32, y: i32, width: u32, height: u32, data: &[u8]) {
        if let Some(data) = self.convert(width, height, data) {
            self.ui.push(UiOperation::PaintBitmap {
                dest: Region::new(x, y, width, height),
                width,
                height,
                data,
            });
        }
    }

    /// Releases an off-screen bitmap
    pub fn destroy_bitmap(&mut self, id: ObjectId) {
        self.ui.push(UiOperation::DestroyBitmap { id });
    }

    /// Fills `dest` with a server color value
    pub fn rect(&mut self, dest: Region, color: u32, rop: u8) {
        match pixel::convert_pixel(self.server_depth, self.client_depth, &self.palette(), color) {
            Ok(color) => self.ui.push(UiOperation::Rect { dest, color, rop }),
            Err(e) => warn!(%e, ?dest, "Dropping fill with unsupported format"),
        }
    }

    /// Applies a destination-only raster op
    pub fn destblt(&mut self, rop: u8, dest: Region) {
        self.ui.push(UiOperation::DestBlt { rop, dest });
    }

    /// Copies within the current target
    pub fn screenblt(&mut self, rop: u8, dest: Region, src_x: i32, src_y: i32) {
        self.ui.push(UiOperation::ScreenBlt {
            rop,
            dest,
            src_x,
            src_y,
        });
    }

    /// Copies from an off-screen bitmap or surface
    pub fn memblt(&mut self, rop: u8, id: ObjectId, dest: Region, src_x: i32, src_y: i32) {
        self.ui.push(UiOperation::MemBlt {
            rop,
            id,
            dest,
            src_x,
            src_y,
        });
    }

    /// Restricts drawing to `clip`
    pub fn set_clip(&mut self, clip: Region) {
        self.ui.push(UiOperation::SetClip { clip });
    }

    /// Removes the clip rectangle
    pub fn reset_clip(&mut self) {
        self.ui.push(UiOperation::ResetClip);
    }

    /// Creates an off-screen surface, optionally superseding an old one
    pub fn create_surface(
        &mut self,
        width: u32,
        height: u32,
        replaces: Option<ObjectId>,
    ) -> ObjectId {
        let id = self.ids.allocate();
        self.ui.push(UiOperation::CreateSurface {
            id,
            width,
            height,
            replaces,
        });
        id
    }

    /// Selects the drawing target, `None` for the desktop
    pub fn set_surface(&mut self, id: Option<ObjectId>) {
        self.ui.push(UiOperation::SetSurface { id });
    }

    /// Releases an off-screen surface
    pub fn destroy_surface(&mut self, id: ObjectId) {
        self.ui.push(UiOperation::DestroySurface { id });
    }

    /// Reports the session as established at the current desktop size
    pub fn connected(&mut self) {
        let (width, height) = self.render.lock_deferred(self.scope).desktop_size();
        self.ui.push(UiOperation::Connected { width, height });
    }

    /// Builds a palette from the server's colormap
    #[must_use]
    pub fn create_colormap(&self, colors: &[Rgb]) -> Palette {
        if colors.len() > 256 {
            warn!(count = colors.len(), "Colormap truncated to 256 entries");
        }
        Palette::from_colors(colors)
    }

    /// Installs a palette for subsequent 8-bit conversions
    pub fn set_colormap(&mut self, palette: Palette) {
        self.render
            .lock_deferred(self.scope)
            .replace_palette(palette);
    }

    /// Converts a pointer image, `None` if it cannot be converted
    #[must_use]
    pub fn create_cursor(
        &self,
        xor_depth: ColorDepth,
        hotspot: (u32, u32),
        width: u32,
        height: u32,
        and_mask: &[u8],
        xor_data: &[u8],
    ) -> Option<CursorImage> {
        pixel::create_cursor(
            xor_depth,
            &self.palette(),
            hotspot,
            width,
            height,
            and_mask,
            xor_data,
        )
        .map_err(|e| warn!(%e, width, height, "Dropping unsupported cursor"))
        .ok()
    }

    /// Shows a pointer image, `None` hides the pointer
    pub fn set_cursor(&mut self, cursor: Option<CursorImage>) {
        self.ui.push(UiOperation::SetCursor { cursor });
    }

    /// Restores the system pointer
    pub fn set_default_cursor(&mut self) {
        self.ui.push(UiOperation::DefaultCursor);
    }

    /// Records a server-side desktop resize
    pub fn desktop_resize(&mut self, width: u32, height: u32) {
        self.render
            .lock_deferred(self.scope)
            .set_desktop_size(width, height);
        self.ui.push(UiOperation::DesktopResize { width, height });
    }
}
