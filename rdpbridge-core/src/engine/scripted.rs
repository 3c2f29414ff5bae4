//! A protocol engine that replays scripted rendering steps
//!
//! Each step pushed through a [`ScriptFeeder`] writes one byte to a Unix
//! socket pair, so the worker is woken by a real descriptor and runs the
//! step from inside `check_fds`, exactly as a network engine would. Input
//! sent by the worker is recorded for inspection.

use std::collections::VecDeque;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{FdInterest, ProtocolEngine, RenderSink};
use crate::error::EngineError;
use crate::input::WireInput;
use crate::pixel::{ColorDepth, Rgb};
use crate::ui::{ObjectId, Region};
use crate::worker::RenderCache;

/// Code run with the render cache locked
pub type RenderHook = Box<dyn FnOnce(&mut RenderCache) + Send>;

/// One scripted engine action
///
/// Bitmaps and surfaces are referred to by creation order, starting at 0.
pub enum ScriptStep {
    /// Session established
    Connected,
    /// Server resized the desktop
    DesktopResize {
        /// New width
        width: u32,
        /// New height
        height: u32,
    },
    /// Install a colormap for 8-bit data
    Colormap(Vec<Rgb>),
    /// Register an off-screen bitmap from server-depth pixels
    CreateBitmap {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Server-depth pixels
        data: Vec<u8>,
    },
    /// Draw server-depth pixels onto the current target
    PaintBitmap {
        /// Left edge
        x: i32,
        /// Top edge
        y: i32,
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Server-depth pixels
        data: Vec<u8>,
    },
    /// Copy from a created bitmap
    MemBlt {
        /// Bitmap index
        bitmap: usize,
        /// Raster op
        rop: u8,
        /// Destination
        dest: Region,
        /// Source left edge
        src_x: i32,
        /// Source top edge
        src_y: i32,
    },
    /// Release a created bitmap
    DestroyBitmap {
        /// Bitmap index
        bitmap: usize,
    },
    /// Solid fill with a server color value
    Rect {
        /// Area
        dest: Region,
        /// Server color value
        color: u32,
        /// Raster op
        rop: u8,
    },
    /// Destination-only raster op
    DestBlt {
        /// Raster op
        rop: u8,
        /// Area
        dest: Region,
    },
    /// Copy within the current target
    ScreenBlt {
        /// Raster op
        rop: u8,
        /// Destination
        dest: Region,
        /// Source left edge
        src_x: i32,
        /// Source top edge
        src_y: i32,
    },
    /// Set the clip rectangle
    SetClip(Region),
    /// Remove the clip rectangle
    ResetClip,
    /// Create an off-screen surface
    CreateSurface {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// Index of a surface this one supersedes
        replaces: Option<usize>,
    },
    /// Select a surface by index, or the desktop
    SetSurface(Option<usize>),
    /// Release a created surface
    DestroySurface {
        /// Surface index
        surface: usize,
    },
    /// Show a pointer image
    Cursor {
        /// Depth of `xor_data`
        depth: ColorDepth,
        /// Hotspot column and row
        hotspot: (u32, u32),
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
        /// 1-bit AND mask
        and_mask: Vec<u8>,
        /// Color data
        xor_data: Vec<u8>,
    },
    /// Hide the pointer
    HideCursor,
    /// Restore the system pointer
    DefaultCursor,
    /// Run code with the render cache locked
    WithRenderCache(RenderHook),
    /// Report an engine failure
    Fail(String),
    /// End the session cleanly
    Disconnect,
}

impl ScriptStep {
    const fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::DesktopResize { .. } => "desktop_resize",
            Self::Colormap(_) => "colormap",
            Self::CreateBitmap { .. } => "create_bitmap",
            Self::PaintBitmap { .. } => "paint_bitmap",
            Self::MemBlt { .. } => "memblt",
            Self::DestroyBitmap { .. } => "destroy_bitmap",
            Self::Rect { .. } => "rect",
            Self::DestBlt { .. } => "destblt",
            Self::ScreenBlt { .. } => "screenblt",
            Self::SetClip(_) => "set_clip",
            Self::ResetClip => "reset_clip",
            Self::CreateSurface { .. } => "create_surface",
            Self::SetSurface(_) => "set_surface",
            Self::DestroySurface { .. } => "destroy_surface",
            Self::Cursor { .. } => "cursor",
            Self::HideCursor => "hide_cursor",
            Self::DefaultCursor => "default_cursor",
            Self::WithRenderCache(_) => "with_render_cache",
            Self::Fail(_) => "fail",
            Self::Disconnect => "disconnect",
        }
    }
}

impl fmt::Debug for ScriptStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Default)]
struct Script {
    steps: VecDeque<ScriptStep>,
    inputs: Vec<WireInput>,
}

fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Feeds steps to a [`ScriptedEngine`] from any thread
///
/// Dropping every feeder closes the socket, which the engine treats as a
/// disconnect once the queued steps have run.
#[derive(Clone)]
pub struct ScriptFeeder {
    script: Arc<Mutex<Script>>,
    tx: Arc<UnixStream>,
}

impl ScriptFeeder {
    /// Queues one step and makes the engine's descriptor readable
    ///
    /// # Errors
    ///
    /// Returns the socket error if the engine side is gone.
    pub fn push(&self, step: ScriptStep) -> std::io::Result<()> {
        lock(&self.script).steps.push_back(step);
        (&*self.tx).write_all(&[1])
    }

    /// Input received by the engine so far, in arrival order
    #[must_use]
    pub fn inputs(&self) -> Vec<WireInput> {
        lock(&self.script).inputs.clone()
    }
}

impl fmt::Debug for ScriptFeeder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFeeder").finish_non_exhaustive()
    }
}

/// The scripted engine itself, moved into the worker
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
    rx: UnixStream,
    bitmaps: Vec<Option<ObjectId>>,
    surfaces: Vec<ObjectId>,
    disconnect: bool,
}

impl ScriptedEngine {
    /// Creates an engine with no steps queued
    ///
    /// # Errors
    ///
    /// Returns the socket error if the pair cannot be created.
    pub fn new() -> std::io::Result<(Self, ScriptFeeder)> {
        let (rx, tx) = UnixStream::pair()?;
        rx.set_nonblocking(true)?;
        let script = Arc::new(Mutex::new(Script::default()));
        Ok((
            Self {
                script: Arc::clone(&script),
                rx,
                bitmaps: Vec::new(),
                surfaces: Vec::new(),
                disconnect: false,
            },
            ScriptFeeder {
                script,
                tx: Arc::new(tx),
            },
        ))
    }

    /// Creates an engine that runs `steps` and then disconnects
    ///
    /// # Errors
    ///
    /// Returns the socket error if the pair cannot be created.
    pub fn with_steps(steps: Vec<ScriptStep>) -> std::io::Result<(Self, ScriptFeeder)> {
        let (engine, feeder) = Self::new()?;
        for step in steps {
            feeder.push(step)?;
        }
        feeder.push(ScriptStep::Disconnect)?;
        Ok((engine, feeder))
    }

    fn bitmap(&self, index: usize) -> Option<ObjectId> {
        let id = self.bitmaps.get(index).copied().flatten();
        if id.is_none() {
            debug!(index, "Scripted bitmap does not exist");
        }
        id
    }

    fn surface(&self, index: usize) -> Option<ObjectId> {
        let id = self.surfaces.get(index).copied();
        if id.is_none() {
            debug!(index, "Scripted surface does not exist");
        }
        id
    }

    fn run(&mut self, step: ScriptStep, sink: &mut RenderSink<'_>) -> Result<(), EngineError> {
        match step {
            ScriptStep::Connected => sink.connected(),
            ScriptStep::DesktopResize { width, height } => sink.desktop_resize(width, height),
            ScriptStep::Colormap(colors) => {
                let palette = sink.create_colormap(&colors);
                sink.set_colormap(palette);
            }
            ScriptStep::CreateBitmap {
                width,
                height,
                data,
            } => {
                let id = sink.create_bitmap(width, height, &data);
                self.bitmaps.push(id);
            }
            ScriptStep::PaintBitmap {
                x,
                y,
                width,
                height,
                data,
            } => sink.paint_bitmap(x, y, width, height, &data),
            ScriptStep::MemBlt {
                bitmap,
                rop,
                dest,
                src_x,
                src_y,
            } => {
                if let Some(id) = self.bitmap(bitmap) {
                    sink.memblt(rop, id, dest, src_x, src_y);
                }
            }
            ScriptStep::DestroyBitmap { bitmap } => {
                if let Some(id) = self.bitmap(bitmap) {
                    sink.destroy_bitmap(id);
                    self.bitmaps[bitmap] = None;
                }
            }
            ScriptStep::Rect { dest, color, rop } => sink.rect(dest, color, rop),
            ScriptStep::DestBlt { rop, dest } => sink.destblt(rop, dest),
            ScriptStep::ScreenBlt {
                rop,
                dest,
                src_x,
                src_y,
            } => sink.screenblt(rop, dest, src_x, src_y),
            ScriptStep::SetClip(clip) => sink.set_clip(clip),
            ScriptStep::ResetClip => sink.reset_clip(),
            ScriptStep::CreateSurface {
                width,
                height,
                replaces,
            } => {
                let replaces = replaces.and_then(|index| self.surface(index));
                let id = sink.create_surface(width, height, replaces);
                self.surfaces.push(id);
            }
            ScriptStep::SetSurface(index) => match index {
                None => sink.set_surface(None),
                Some(index) => {
                    if let Some(id) = self.surface(index) {
                        sink.set_surface(Some(id));
                    }
                }
            },
            ScriptStep::DestroySurface { surface } => {
                if let Some(id) = self.surface(surface) {
                    sink.destroy_surface(id);
                }
            }
            ScriptStep::Cursor {
                depth,
                hotspot,
                width,
                height,
                and_mask,
                xor_data,
            } => {
                if let Some(cursor) =
                    sink.create_cursor(depth, hotspot, width, height, &and_mask, &xor_data)
                {
                    sink.set_cursor(Some(cursor));
                }
            }
            ScriptStep::HideCursor => sink.set_cursor(None),
            ScriptStep::DefaultCursor => sink.set_default_cursor(),
            ScriptStep::WithRenderCache(hook) => sink.with_render_cache(hook),
            ScriptStep::Fail(message) => return Err(EngineError::new(message)),
            ScriptStep::Disconnect => self.disconnect = true,
        }
        Ok(())
    }
}

impl ProtocolEngine for ScriptedEngine {
    fn get_fds<'fd>(&'fd self, interest: &mut FdInterest<'fd>) -> Result<(), EngineError> {
        interest.read(self.rx.as_fd());
        Ok(())
    }

    fn check_fds(&mut self, sink: &mut RenderSink<'_>) -> Result<(), EngineError> {
        let mut byte = [0u8; 1];
        match self.rx.read(&mut byte) {
            Ok(0) => {
                debug!("Script feeder closed");
                self.disconnect = true;
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                return Ok(());
            }
            Err(e) => return Err(EngineError::new(format!("script socket: {e}"))),
        }
        let step = lock(&self.script).steps.pop_front();
        match step {
            Some(step) => {
                debug!(?step, "Running scripted step");
                self.run(step, sink)
            }
            None => Ok(()),
        }
    }

    fn send_input(&mut self, input: WireInput) {
        lock(&self.script).inputs.push(input);
    }

    fn request_disconnect(&mut self) {
        self.disconnect = true;
    }

    fn shall_disconnect(&self) -> bool {
        self.disconnect
    }
}

impl fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedEngine")
            .field("bitmaps", &self.bitmaps.len())
            .field("surfaces", &self.surfaces.len())
            .field("disconnect", &self.disconnect)
            .finish_non_exhaustive()
    }
}
