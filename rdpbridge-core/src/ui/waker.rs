//! Waking the GUI event loop from the worker thread

use std::sync::mpsc::Sender;

/// Schedules one callback on the GUI thread's event loop
///
/// Called from the worker thread. Implementations post an idle callback
/// (or equivalent) and return immediately; they never run GUI code
/// themselves.
pub trait GuiWaker: Send + Sync {
    /// Requests one wake-up of the GUI event loop
    fn wake(&self);
}

/// Waker for event loops that block on a channel
///
/// Each wake sends one unit message; a loop receiving it drains the
/// session. Sends after the receiver is gone are ignored.
#[derive(Debug, Clone)]
pub struct ChannelWaker {
    tx: Sender<()>,
}

impl ChannelWaker {
    /// Creates a waker posting to `tx`
    #[must_use]
    pub const fn new(tx: Sender<()>) -> Self {
        Self { tx }
    }
}

impl GuiWaker for ChannelWaker {
    fn wake(&self) {
        if self.tx.send(()).is_err() {
            tracing::trace!("GUI loop gone, wake-up dropped");
        }
    }
}
