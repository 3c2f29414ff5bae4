//! GLib main-loop integration
//!
//! [`GlibWaker`] turns worker wake-ups into idle callbacks on the thread
//! that runs the default main context. A wake always runs on a later loop
//! iteration, also when it is issued from inside the callback itself.
//! [`ScaleTimer`] is the settle timer that delays rebuilding the scaled
//! image until the widget stops resizing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gtk4::glib;

use crate::config::BridgeConfig;
use crate::display::{DisplaySession, ProtocolService};
use crate::engine::{ChannelManager, ProtocolEngine};
use crate::error::WorkerResult;
use crate::ui::GuiWaker;
use crate::worker::{ConnectionHandle, ConnectionWorker};

type WakeCallback = Rc<RefCell<Box<dyn FnMut()>>>;

thread_local! {
    static CALLBACKS: RefCell<HashMap<u64, WakeCallback>> = RefCell::new(HashMap::new());
}

static NEXT_WAKER_ID: AtomicU64 = AtomicU64::new(1);

/// Posts wake-ups as idle sources on the GUI thread's main context
#[derive(Debug)]
pub struct GlibWaker {
    id: u64,
    context: glib::MainContext,
}

impl GlibWaker {
    /// Registers `on_wake` on the calling thread
    ///
    /// Must be called on the thread that runs its thread-default main
    /// context, normally the GTK main loop. The callback stays registered
    /// until the returned registration is dropped.
    pub fn register(on_wake: impl FnMut() + 'static) -> (Arc<Self>, WakerRegistration) {
        let id = NEXT_WAKER_ID.fetch_add(1, Ordering::Relaxed);
        let callback: WakeCallback = Rc::new(RefCell::new(Box::new(on_wake)));
        CALLBACKS.with(|callbacks| callbacks.borrow_mut().insert(id, callback));
        let waker = Self {
            id,
            context: glib::MainContext::ref_thread_default(),
        };
        (Arc::new(waker), WakerRegistration { id })
    }
}

impl GuiWaker for GlibWaker {
    fn wake(&self) {
        post(self.id, &self.context);
    }
}

fn post(id: u64, context: &glib::MainContext) {
    let target = context.clone();
    let source = glib::source::idle_source_new(None, glib::Priority::DEFAULT_IDLE, move || {
        dispatch(id, &target);
        glib::ControlFlow::Break
    });
    source.attach(Some(context));
}

fn dispatch(id: u64, context: &glib::MainContext) {
    let Some(callback) = CALLBACKS.with(|callbacks| callbacks.borrow().get(&id).cloned()) else {
        tracing::trace!(id, "Wake-up for a released session");
        return;
    };
    let Ok(mut callback) = callback.try_borrow_mut() else {
        // Busy further up the stack; try again on the next idle
        post(id, context);
        return;
    };
    callback();
}

/// Keeps a [`GlibWaker`] callback registered
#[derive(Debug)]
pub struct WakerRegistration {
    id: u64,
}

impl Drop for WakerRegistration {
    fn drop(&mut self) {
        CALLBACKS.with(|callbacks| callbacks.borrow_mut().remove(&self.id));
    }
}

/// One-shot timer that restarts when armed again
#[derive(Debug, Default)]
pub struct ScaleTimer {
    source: Rc<RefCell<Option<glib::SourceId>>>,
}

impl ScaleTimer {
    /// Creates an idle timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `on_fire` after `delay`, replacing a pending run
    pub fn arm(&self, delay: Duration, on_fire: impl FnOnce() + 'static) {
        self.cancel();
        let slot = Rc::clone(&self.source);
        let source_id = glib::timeout_add_local_once(delay, move || {
            // A fired source must not be removed again
            slot.borrow_mut().take();
            on_fire();
        });
        *self.source.borrow_mut() = Some(source_id);
    }

    /// Drops a pending run
    pub fn cancel(&self) {
        if let Some(source_id) = self.source.borrow_mut().take() {
            source_id.remove();
        }
    }

    /// Returns true while a run is pending
    pub fn is_armed(&self) -> bool {
        self.source.borrow().is_some()
    }
}

impl Drop for ScaleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A connection wired into the GLib main loop
pub struct GtkConnection<S: ProtocolService> {
    handle: ConnectionHandle,
    session: Rc<RefCell<DisplaySession<S>>>,
    timer: ScaleTimer,
    _registration: WakerRegistration,
}

impl<S: ProtocolService + 'static> GtkConnection<S> {
    /// Spawns the worker and routes its wake-ups to a new session
    ///
    /// Call on the GUI thread.
    ///
    /// # Errors
    ///
    /// Returns the worker's setup failure.
    pub fn spawn<E, C>(config: BridgeConfig, engine: E, channels: C, service: S) -> WorkerResult<Self>
    where
        E: ProtocolEngine + 'static,
        C: ChannelManager + 'static,
    {
        let slot: Rc<RefCell<Option<Rc<RefCell<DisplaySession<S>>>>>> = Rc::default();
        let wake_slot = Rc::clone(&slot);
        let (waker, registration) = GlibWaker::register(move || {
            let session = wake_slot.borrow().clone();
            if let Some(session) = session {
                session.borrow_mut().on_wake();
            }
        });

        let (handle, link) = ConnectionWorker::spawn(&config, engine, channels, waker)?;
        let session = Rc::new(RefCell::new(DisplaySession::new(config, link, service)));
        *slot.borrow_mut() = Some(Rc::clone(&session));

        Ok(Self {
            handle,
            session,
            timer: ScaleTimer::new(),
            _registration: registration,
        })
    }

    /// The display session, for drawing and input handlers
    pub fn session(&self) -> &Rc<RefCell<DisplaySession<S>>> {
        &self.session
    }

    /// The worker handle
    pub const fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Forwards a widget allocation, arming the settle timer when scaling
    pub fn configure(&self, width: u32, height: u32) {
        let mut session = self.session.borrow_mut();
        if session.configure(width, height) {
            let delay = session.config().scale_settle();
            let weak = Rc::downgrade(&self.session);
            self.timer.arm(delay, move || {
                if let Some(session) = weak.upgrade() {
                    session.borrow_mut().scale_timer_fired();
                }
            });
        }
    }
}

impl<S: ProtocolService> std::fmt::Debug for GtkConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GtkConnection")
            .field("handle", &self.handle)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}
