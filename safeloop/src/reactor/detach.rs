use super::poller::Waker;
use super::timer::TimerKey;

use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;

/// A registration whose owner was dropped without stopping it.
pub(crate) enum Detached {
    Io(u64),
    Timer(TimerKey),
}

/// Registrations released by dropped watchers, waiting for the reactor
/// thread to remove them.
///
/// Watchers can be dropped on any thread and cannot reach the reactor
/// from `Drop`. They push here instead and wake the poller; the reactor
/// removes everything listed at the start of its next iteration, and
/// before any new registration.
pub(crate) struct DetachQueue {
    pending: Mutex<Vec<Detached>>,
    waker: Arc<Waker>,
}

impl DetachQueue {
    pub(crate) fn new(waker: Arc<Waker>) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(Vec::new()),
            waker,
        })
    }

    pub(crate) fn push(&self, detached: Detached) {
        self.pending.lock().push(detached);
        self.waker.wake();
    }

    pub(crate) fn take(&self) -> Vec<Detached> {
        mem::take(&mut *self.pending.lock())
    }
}
