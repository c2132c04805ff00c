use super::core::Reactor;
use super::poller::Waker;

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Callback of an async signal source.
pub(crate) type SignalCallback = Arc<Mutex<dyn FnMut(&Reactor) + Send>>;

/// An async signal registered with the reactor.
///
/// Pending signals are dispatched before I/O and timers in every loop
/// iteration.
pub(crate) struct SignalEntry {
    pub(crate) pending: Arc<AtomicBool>,

    pub(crate) callback: SignalCallback,
}

/// Thread-safe trigger for an async signal source.
///
/// Sends coalesce: any number of [`send`](Self::send) calls made before
/// the reactor observes the signal result in a single callback run. The
/// pending flag is cleared before the callback is invoked, so a send that
/// races with the callback always schedules another run.
#[derive(Clone)]
pub(crate) struct AsyncSignal {
    key: usize,
    pending: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl AsyncSignal {
    pub(crate) fn new(key: usize, pending: Arc<AtomicBool>, waker: Arc<Waker>) -> Self {
        Self {
            key,
            pending,
            waker,
        }
    }

    /// Slab key of the signal inside the reactor.
    pub(crate) fn key(&self) -> usize {
        self.key
    }

    /// Marks the signal pending and interrupts the reactor's wait.
    pub(crate) fn send(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.waker.wake();
        }
    }
}
