//! Input queue with a self-pipe wake-up
//!
//! The GUI thread appends events under a short lock and writes one byte to a
//! non-blocking pipe. The worker includes the pipe's read end in its
//! multiplexed wait, so a push always interrupts a blocked `select`.
//!
//! Draining empties the pipe before taking the queue. A push racing with a
//! drain can therefore only leave an extra byte behind (a spurious wake with
//! nothing queued), never a queued event without a pending byte.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nix::fcntl::OFlag;
use nix::sys::select::{select, FdSet};
use nix::sys::time::TimeVal;
use nix::unistd::pipe2;

use super::InputEvent;
use crate::error::{WorkerError, WorkerResult};

struct Shared {
    queue: Mutex<VecDeque<InputEvent>>,
    wake_tx: File,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, VecDeque<InputEvent>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn signal(&self) {
        match (&self.wake_tx).write(&[0]) {
            Ok(_) => {}
            // A full pipe is already signalled
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            // The worker has exited and dropped the read end
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                tracing::trace!("Input pipe closed, wake-up dropped");
            }
            Err(e) => tracing::warn!(%e, "Failed to signal input pipe"),
        }
    }
}

/// Both ends of an input channel, before they are handed to their threads
pub struct InputEventChannel {
    sender: InputSender,
    receiver: InputReceiver,
}

impl InputEventChannel {
    /// Creates the queue and its wake-up pipe
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Pipe` if the pipe cannot be created.
    pub fn new() -> WorkerResult<Self> {
        let (read_end, write_end) =
            pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC).map_err(WorkerError::Pipe)?;
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            wake_tx: File::from(write_end),
        });
        Ok(Self {
            sender: InputSender {
                shared: Arc::clone(&shared),
            },
            receiver: InputReceiver {
                shared,
                wake_rx: File::from(read_end),
            },
        })
    }

    /// Separates the GUI end from the worker end
    #[must_use]
    pub fn split(self) -> (InputSender, InputReceiver) {
        (self.sender, self.receiver)
    }

    /// Queues an event, see [`InputSender::push`]
    pub fn push(&self, event: InputEvent) {
        self.sender.push(event);
    }

    /// Takes all queued events, see [`InputReceiver::drain`]
    pub fn drain(&mut self) -> Vec<InputEvent> {
        self.receiver.drain()
    }
}

/// GUI end of the input channel
pub struct InputSender {
    shared: Arc<Shared>,
}

impl InputSender {
    /// Queues an event and wakes the worker; never blocks, never drops
    pub fn push(&self, event: InputEvent) {
        self.shared.lock().push_back(event);
        self.shared.signal();
    }

    /// Queues several events with a single wake-up byte
    pub fn push_all<I>(&self, events: I)
    where
        I: IntoIterator<Item = InputEvent>,
    {
        let pushed = {
            let mut queue = self.shared.lock();
            let before = queue.len();
            queue.extend(events);
            queue.len() > before
        };
        if pushed {
            self.shared.signal();
        }
    }

    /// Returns a handle that wakes the worker without queueing an event
    #[must_use]
    pub fn wake_handle(&self) -> WakeHandle {
        WakeHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Wakes the worker's multiplexed wait from any thread
#[derive(Clone)]
pub struct WakeHandle {
    shared: Arc<Shared>,
}

impl WakeHandle {
    /// Makes the wake-up fd readable
    pub fn wake(&self) {
        self.shared.signal();
    }
}

impl std::fmt::Debug for WakeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeHandle").finish_non_exhaustive()
    }
}

/// Worker end of the input channel
pub struct InputReceiver {
    shared: Arc<Shared>,
    wake_rx: File,
}

impl InputReceiver {
    /// The descriptor to include in the worker's read set
    #[must_use]
    pub fn wake_fd(&self) -> BorrowedFd<'_> {
        self.wake_rx.as_fd()
    }

    /// Takes every queued event in push order and clears the wake-up fd
    pub fn drain(&mut self) -> Vec<InputEvent> {
        self.clear_pipe();
        let events: Vec<InputEvent> = self.shared.lock().drain(..).collect();
        if !events.is_empty() {
            tracing::trace!(count = events.len(), "Drained input events");
        }
        events
    }

    /// Returns true if the wake-up fd is currently readable
    #[must_use]
    pub fn is_signalled(&self) -> bool {
        let mut read_set = FdSet::new();
        read_set.insert(self.wake_fd());
        let mut timeout = TimeVal::new(0, 0);
        matches!(
            select(None, &mut read_set, None, None, &mut timeout),
            Ok(ready) if ready > 0
        )
    }

    fn clear_pipe(&mut self) {
        let mut buf = [0u8; 64];
        loop {
            match self.wake_rx.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(%e, "Failed to clear input pipe");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{PointerFlags, Scancode};

    #[test]
    fn test_push_signals_and_drain_clears() {
        let mut channel = InputEventChannel::new().unwrap();
        assert!(!channel.receiver.is_signalled());
        channel.push(InputEvent::key(Scancode::standard(0x1e), true));
        assert!(channel.receiver.is_signalled());
        let events = channel.drain();
        assert_eq!(events.len(), 1);
        assert!(!channel.receiver.is_signalled());
    }

    #[test]
    fn test_drain_preserves_order() {
        let (sender, mut receiver) = InputEventChannel::new().unwrap().split();
        let events = [
            InputEvent::key(Scancode::standard(1), true),
            InputEvent::Mouse {
                flags: PointerFlags::MOVE,
                x: 5,
                y: 6,
            },
            InputEvent::key(Scancode::standard(1), false),
        ];
        for event in events {
            sender.push(event);
        }
        assert_eq!(receiver.drain(), events.to_vec());
        assert!(receiver.drain().is_empty());
    }

    #[test]
    fn test_many_pushes_never_block() {
        // Far more pushes than the pipe can buffer
        let (sender, mut receiver) = InputEventChannel::new().unwrap().split();
        for i in 0..100_000u32 {
            sender.push(InputEvent::Mouse {
                flags: PointerFlags::MOVE,
                x: (i % 1000) as u16,
                y: 0,
            });
        }
        assert_eq!(receiver.drain().len(), 100_000);
        assert!(!receiver.is_signalled());
    }

    #[test]
    fn test_wake_handle_signals_without_events() {
        let (sender, mut receiver) = InputEventChannel::new().unwrap().split();
        sender.wake_handle().wake();
        assert!(receiver.is_signalled());
        assert!(receiver.drain().is_empty());
        assert!(!receiver.is_signalled());
    }

    #[test]
    fn test_push_all_uses_one_signal() {
        let (sender, mut receiver) = InputEventChannel::new().unwrap().split();
        sender.push_all(vec![
            InputEvent::key(Scancode::standard(2), false),
            InputEvent::key(Scancode::standard(3), false),
        ]);
        sender.push_all(Vec::new());
        assert_eq!(receiver.drain().len(), 2);
    }
}
