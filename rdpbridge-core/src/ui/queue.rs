//! Single-producer, single-consumer operation queue with coalesced wake-ups

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{GuiWaker, UiOperation};

#[derive(Debug, Default)]
struct QueueState {
    ops: VecDeque<UiOperation>,
    drain_scheduled: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    waker: Arc<dyn GuiWaker>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates a queue, returning its worker end and its GUI end
pub fn ui_queue(waker: Arc<dyn GuiWaker>) -> (UiProducer, UiConsumer) {
    let shared = Arc::new(Shared {
        state: Mutex::new(QueueState::default()),
        waker,
    });
    (
        UiProducer {
            shared: Arc::clone(&shared),
        },
        UiConsumer { shared },
    )
}

/// Worker end of the queue
pub struct UiProducer {
    shared: Arc<Shared>,
}

impl UiProducer {
    /// Appends an operation, scheduling a drain if none is pending
    pub fn push(&self, op: UiOperation) {
        let needs_wake = {
            let mut state = self.shared.lock();
            state.ops.push_back(op);
            !std::mem::replace(&mut state.drain_scheduled, true)
        };
        if needs_wake {
            self.shared.waker.wake();
        }
    }
}

/// GUI end of the queue
pub struct UiConsumer {
    shared: Arc<Shared>,
}

impl UiConsumer {
    /// Applies every queued operation in push order
    ///
    /// The batch present at the start of the call is taken in one step and
    /// applied without holding the queue lock. If the producer added more
    /// in the meantime, a follow-up drain is scheduled instead of looping,
    /// so one call never runs longer than the queue it found. Otherwise the
    /// pending-drain flag is cleared and the next push wakes the GUI again.
    ///
    /// Returns the number of operations applied.
    pub fn drain_into<F>(&self, mut apply: F) -> usize
    where
        F: FnMut(UiOperation),
    {
        let batch = std::mem::take(&mut self.shared.lock().ops);
        let count = batch.len();
        for op in batch {
            apply(op);
        }
        let reschedule = {
            let mut state = self.shared.lock();
            if state.ops.is_empty() {
                state.drain_scheduled = false;
                false
            } else {
                true
            }
        };
        if reschedule {
            self.shared.waker.wake();
        }
        count
    }

    /// Number of operations waiting
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().ops.len()
    }

    /// Returns true if nothing is waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if a drain has been requested and not yet completed
    #[must_use]
    pub fn is_drain_scheduled(&self) -> bool {
        self.shared.lock().drain_scheduled
    }
}
