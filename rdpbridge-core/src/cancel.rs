//! Cooperative cancellation of the connection worker
//!
//! A [`CancelHandle`] is held by the GUI side. Requesting cancellation sets a
//! flag and writes to the worker's input wake-up pipe, so a worker blocked
//! in its multiplexed wait returns at once.
//!
//! The worker owns the matching [`CancelScope`]. Cancellation is *deferred*
//! by default and observed only at [`CancelScope::checkpoint`]. The wait
//! itself runs inside an [`AsyncWindow`], where a pending request is acted
//! on as soon as the wait returns. Both need `&mut CancelScope`, while the
//! render lock is taken through `&CancelScope`:
//!
//! - no lock guard can be alive inside an async window
//! - no checkpoint can be reached while a lock guard is alive
//!
//! Both orderings are enforced by the borrow checker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::input::WakeHandle;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    disconnect: AtomicBool,
}

/// Why the worker stopped at a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The connection is being closed from outside
    Cancelled,
    /// A clean disconnect was requested
    Disconnect,
}

/// Current cancellation window of the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Requests take effect at checkpoints only
    Deferred,
    /// Requests take effect as soon as the current wait returns
    Asynchronous,
}

/// Creates a connected handle and scope
pub fn cancel_pair(waker: WakeHandle) -> (CancelHandle, CancelScope) {
    let state = Arc::new(CancelState::default());
    (
        CancelHandle {
            state: Arc::clone(&state),
            waker,
        },
        CancelScope {
            state,
            mode: CancelMode::Deferred,
        },
    )
}

/// A handle for cancelling the worker from another thread
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
    waker: WakeHandle,
}

impl CancelHandle {
    /// Signals cancellation and wakes the worker
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.waker.wake();
    }

    /// Asks the worker to disconnect cleanly through the engine
    pub fn request_disconnect(&self) {
        self.state.disconnect.store(true, Ordering::SeqCst);
        self.waker.wake();
    }

    /// Returns true if cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }
}

/// Worker-side view of cancellation requests
#[derive(Debug)]
pub struct CancelScope {
    state: Arc<CancelState>,
    mode: CancelMode,
}

impl CancelScope {
    /// Observes pending requests; cancellation wins over disconnect
    ///
    /// # Errors
    ///
    /// Returns the interruption the worker must act on.
    pub fn checkpoint(&mut self) -> Result<(), Interruption> {
        if self.state.cancelled.load(Ordering::SeqCst) {
            return Err(Interruption::Cancelled);
        }
        if self.state.disconnect.swap(false, Ordering::SeqCst) {
            return Err(Interruption::Disconnect);
        }
        Ok(())
    }

    /// Current window
    #[must_use]
    pub const fn mode(&self) -> CancelMode {
        self.mode
    }

    /// Opens the asynchronous window for the duration of a wait
    pub fn enter_async(&mut self) -> AsyncWindow<'_> {
        self.mode = CancelMode::Asynchronous;
        AsyncWindow { scope: self }
    }

    /// Locks a mutex shared with the GUI thread
    ///
    /// The guard borrows the scope, so it must be dropped before the next
    /// checkpoint or async window.
    pub fn lock<'a, T>(&'a self, mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        debug_assert_eq!(self.mode, CancelMode::Deferred);
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The interruptible section around the multiplexed wait
///
/// Dropping the window restores deferred cancellation.
#[derive(Debug)]
pub struct AsyncWindow<'a> {
    scope: &'a mut CancelScope,
}

impl AsyncWindow<'_> {
    /// Returns true if the wait should be abandoned
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.scope.state.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for AsyncWindow<'_> {
    fn drop(&mut self) {
        self.scope.mode = CancelMode::Deferred;
    }
}
