use crate::reactor::{AsyncSignal, Reactor, SignalCallback};

use std::sync::OnceLock;
use std::thread;

/// The reactor-registered source that makes the reactor thread drain the
/// command queue.
///
/// Bound once, right after the dispatcher is built, and unbound when the
/// dispatcher is destroyed. Async signals are dispatched before any other
/// source in a loop iteration.
pub(crate) struct WakeupSignal {
    signal: OnceLock<AsyncSignal>,
}

impl WakeupSignal {
    pub(crate) fn new() -> Self {
        Self {
            signal: OnceLock::new(),
        }
    }

    pub(crate) fn bind(&self, reactor: &Reactor, callback: SignalCallback) {
        let signal = reactor.add_signal(callback);

        if let Err(signal) = self.signal.set(signal) {
            reactor.remove_signal(&signal);
        }
    }

    /// Asks the reactor thread for a drain. Callable from any thread.
    pub(crate) fn notify(&self) {
        if let Some(signal) = self.signal.get() {
            signal.send();
        }
    }

    /// Removes the signal from the reactor. Returns `false` if it was
    /// already removed.
    pub(crate) fn unbind(&self, reactor: &Reactor) -> bool {
        self.signal
            .get()
            .is_some_and(|signal| reactor.remove_signal(signal))
    }
}

/// Re-raises the wakeup signal if a drain unwinds, so the commands left
/// in flight are picked up by the next loop iteration.
pub(crate) struct RearmOnUnwind<'a>(pub(crate) &'a WakeupSignal);

impl Drop for RearmOnUnwind<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.notify();
        }
    }
}
