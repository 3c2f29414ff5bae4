//! Connection worker thread
//!
//! One dedicated thread per connection drives the protocol engine in a
//! `select` loop. It is the only producer of [`UiOperation`]s and the only
//! consumer of input events, and it never touches GUI objects: everything
//! it wants shown travels through the UI queue, and its termination is
//! announced with a single [`ControlSignal::Closed`].
//!
//! [`UiOperation`]: crate::ui::UiOperation

mod render;

pub use render::{PixelBuffer, RenderCache, RenderState};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use nix::errno::Errno;
use nix::sys::select::FD_SETSIZE;
use tracing::{debug, error, info, trace};

use crate::cancel::{cancel_pair, CancelHandle, CancelScope, Interruption};
use crate::config::BridgeConfig;
use crate::engine::{ChannelManager, FdInterest, FdSource, ProtocolEngine, Readiness, RenderSink};
use crate::error::{EngineError, WorkerError, WorkerResult};
use crate::input::{InputEventChannel, InputReceiver, InputSender};
use crate::pixel::ColorDepth;
use crate::ui::{ui_queue, GuiWaker, ObjectIdAllocator, UiConsumer, UiProducer};

/// Why the worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The engine ended the session, on its own or on request
    Disconnected,
    /// The connection was closed from the GUI side
    Cancelled,
    /// The engine, the channels or the wait failed
    Failed,
}

/// Final report of a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    /// Why the worker stopped
    pub reason: CloseReason,
    /// Human-readable failure, present for [`CloseReason::Failed`]
    pub error: Option<String>,
}

/// Worker-to-GUI notifications that are not rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    /// The worker has terminated; sent exactly once
    Closed(WorkerExit),
}

/// State both threads may read
#[derive(Debug)]
pub struct SharedState {
    render: RenderState,
    error: Mutex<Option<String>>,
}

impl SharedState {
    fn new(width: u32, height: u32) -> Self {
        Self {
            render: RenderState::new(RenderCache::new(width, height)),
            error: Mutex::new(None),
        }
    }

    /// The render cache and its lock
    #[must_use]
    pub const fn render(&self) -> &RenderState {
        &self.render
    }

    /// The failure recorded by the worker, if any
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_error(&self, message: String) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = Some(message);
    }
}

/// Everything the worker owns for the lifetime of a connection
pub(crate) struct ConnectionState<E, C> {
    engine: E,
    channels: C,
    server_depth: ColorDepth,
    client_depth: ColorDepth,
    shared: Arc<SharedState>,
    ui: UiProducer,
    input: InputReceiver,
    ids: ObjectIdAllocator,
}

impl<E: ProtocolEngine, C: ChannelManager> ConnectionState<E, C> {
    /// Runs the loop until the connection ends
    ///
    /// # Errors
    ///
    /// Returns the failure that ended the connection.
    pub(crate) fn run(&mut self, scope: &mut CancelScope) -> WorkerResult<CloseReason> {
        loop {
            match scope.checkpoint() {
                Ok(()) => {}
                Err(Interruption::Cancelled) => return Ok(CloseReason::Cancelled),
                Err(Interruption::Disconnect) => {
                    debug!("Disconnect requested");
                    self.engine.request_disconnect();
                }
            }
            if self.engine.shall_disconnect() {
                return Ok(CloseReason::Disconnected);
            }

            let Some(ready) = self.wait(scope)? else {
                return Ok(CloseReason::Cancelled);
            };

            if ready.engine {
                let mut sink = RenderSink::new(
                    &self.shared.render,
                    scope,
                    &self.ui,
                    &mut self.ids,
                    self.server_depth,
                    self.client_depth,
                );
                self.engine
                    .check_fds(&mut sink)
                    .map_err(WorkerError::Engine)?;
            }
            if ready.channels {
                self.channels.check_fds().map_err(WorkerError::Channel)?;
            }
            if ready.wake {
                for event in self.input.drain() {
                    self.engine.send_input(event.to_wire());
                }
            }
        }
    }

    /// One multiplexed wait; `None` if cancelled while waiting
    fn wait(&self, scope: &mut CancelScope) -> WorkerResult<Option<Readiness>> {
        let mut interest = FdInterest::new();
        self.engine
            .get_fds(&mut interest)
            .map_err(WorkerError::Engine)?;
        interest.set_source(FdSource::Channels);
        self.channels
            .get_fds(&mut interest)
            .map_err(WorkerError::Channel)?;
        if interest.is_empty() {
            return Err(WorkerError::NoDescriptors);
        }
        interest.set_source(FdSource::Wake);
        interest.read(self.input.wake_fd());
        if let Some((source, fd)) = interest.beyond_select_limit() {
            let err = EngineError::new(format!(
                "descriptor {fd} from {source:?} is beyond the select limit of {FD_SETSIZE}"
            ));
            return Err(match source {
                FdSource::Channels => WorkerError::Channel(err),
                FdSource::Engine | FdSource::Wake => WorkerError::Engine(err),
            });
        }

        let window = scope.enter_async();
        loop {
            match interest.wait() {
                Ok(ready) => {
                    if window.is_cancelled() {
                        return Ok(None);
                    }
                    return Ok(Some(ready));
                }
                Err(Errno::EINTR | Errno::EAGAIN) => {
                    trace!("Wait interrupted, retrying");
                    if window.is_cancelled() {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(WorkerError::Multiplex(e)),
            }
        }
    }
}

/// GUI-side control of a running worker
///
/// Dropping the handle closes the connection and joins the thread.
pub struct ConnectionHandle {
    cancel: CancelHandle,
    thread: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    /// Cancels the connection, waking the worker if it is blocked
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Asks the engine to disconnect cleanly
    pub fn disconnect(&self) {
        self.cancel.request_disconnect();
    }

    /// Returns true once the worker thread has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Waits for the worker thread to exit
    pub fn join(mut self) {
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Connection worker panicked");
            }
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.close();
            self.join_thread();
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

/// The GUI-thread ends of a connection
pub struct DisplayLink {
    /// Rendering operations from the worker
    pub ui: UiConsumer,
    /// Control notifications from the worker
    pub control: Receiver<ControlSignal>,
    /// Input towards the worker
    pub input: InputSender,
    /// Render cache and recorded error
    pub shared: Arc<SharedState>,
}

/// Starts connection workers
#[derive(Debug)]
pub struct ConnectionWorker;

impl ConnectionWorker {
    /// Spawns the worker thread for an established engine
    ///
    /// `waker` is called whenever the GUI thread has something to drain,
    /// both operations and the final [`ControlSignal::Closed`].
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Pipe` or `WorkerError::Spawn` if the thread
    /// cannot be set up.
    pub fn spawn<E, C>(
        config: &BridgeConfig,
        engine: E,
        channels: C,
        waker: Arc<dyn GuiWaker>,
    ) -> WorkerResult<(ConnectionHandle, DisplayLink)>
    where
        E: ProtocolEngine + 'static,
        C: ChannelManager + 'static,
    {
        let (input_tx, input_rx) = InputEventChannel::new()?.split();
        let (cancel, mut scope) = cancel_pair(input_tx.wake_handle());
        let (ui_tx, ui_rx) = ui_queue(Arc::clone(&waker));
        let (control_tx, control_rx) = mpsc::channel();
        let shared = Arc::new(SharedState::new(config.width, config.height));

        let mut state = ConnectionState {
            engine,
            channels,
            server_depth: config.server_depth,
            client_depth: config.client_depth,
            shared: Arc::clone(&shared),
            ui: ui_tx,
            input: input_rx,
            ids: ObjectIdAllocator::new(),
        };

        let thread = thread::Builder::new()
            .name("rdpbridge-worker".to_string())
            .spawn(move || {
                // A panicking engine must still produce the close notification
                let result = panic::catch_unwind(AssertUnwindSafe(|| state.run(&mut scope)))
                    .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(&*payload))));
                finish(&state.shared, result, &control_tx, waker.as_ref());
            })
            .map_err(WorkerError::Spawn)?;

        info!(
            width = config.width,
            height = config.height,
            server_depth = %config.server_depth,
            client_depth = %config.client_depth,
            "Connection worker started"
        );

        Ok((
            ConnectionHandle {
                cancel,
                thread: Some(thread),
            },
            DisplayLink {
                ui: ui_rx,
                control: control_rx,
                input: input_tx,
                shared,
            },
        ))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn finish(
    shared: &SharedState,
    result: WorkerResult<CloseReason>,
    control: &Sender<ControlSignal>,
    waker: &dyn GuiWaker,
) {
    let exit = match result {
        Ok(reason) => {
            info!(?reason, "Connection worker finished");
            WorkerExit {
                reason,
                error: None,
            }
        }
        Err(e) => {
            error!(%e, "Connection worker failed");
            let message = e.to_string();
            shared.set_error(message.clone());
            WorkerExit {
                reason: CloseReason::Failed,
                error: Some(message),
            }
        }
    };
    if control.send(ControlSignal::Closed(exit)).is_err() {
        debug!("Display side already gone");
    }
    waker.wake();
}
