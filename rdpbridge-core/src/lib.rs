//! `RdpBridge` Core Library
//!
//! This crate bridges a protocol engine running on its own worker thread to a
//! single-threaded GUI toolkit: pixel format conversion, a rendering
//! operation queue towards the GUI, an input channel towards the worker, and
//! the display side that applies operations to canvases.

pub mod cancel;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
#[cfg(feature = "gtk")]
pub mod gtk;
pub mod input;
pub mod pixel;
pub mod ui;
pub mod worker;

pub use cancel::{cancel_pair, AsyncWindow, CancelHandle, CancelMode, CancelScope, Interruption};
pub use config::{BridgeConfig, MAX_SCALE_PERCENT};
pub use display::{
    Canvas, DisplayDispatcher, DisplaySession, Frame, HeadlessService, ProtocolService,
    ProtocolSignal, ScaleGeometry,
};
pub use engine::{
    ChannelManager, FdInterest, NoChannels, ProtocolEngine, RenderSink, ScriptFeeder, ScriptStep,
    ScriptedEngine,
};
pub use error::{
    BridgeError, ConfigError, ConfigResult, EngineError, PixelError, PixelResult, Result,
    WorkerError, WorkerResult,
};
pub use input::{
    InputEvent, InputEventChannel, InputReceiver, InputSender, PressedKeys, Scancode, WireInput,
};
pub use pixel::{
    convert_image, convert_pixel, create_cursor, ColorDepth, CursorImage, Palette, Rgb, Rgba,
};
pub use ui::{ui_queue, ChannelWaker, GuiWaker, ObjectId, Region, UiConsumer, UiOperation, UiProducer};
pub use worker::{
    CloseReason, ConnectionHandle, ConnectionWorker, ControlSignal, DisplayLink, SharedState,
    WorkerExit,
};
