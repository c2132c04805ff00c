use super::Watcher;
use crate::error::Result;
use crate::reactor::{DetachQueue, Detached, Interest, IoCallback, Reactor, Ready};

use parking_lot::Mutex;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Watches a file descriptor for readiness.
///
/// Readiness is level-triggered: the callback runs in every loop iteration
/// while the descriptor stays ready. The descriptor is borrowed, not owned,
/// and must stay open while the watcher is active.
///
/// Only one active watcher per descriptor and reactor is supported.
///
/// # Examples
///
/// ```rust,ignore
/// let mut watcher = IoWatcher::new(fd, Interest::READABLE, |_reactor, ready| {
///     assert!(ready.readable);
/// });
/// dispatcher.start(&mut watcher)?;
/// ```
pub struct IoWatcher {
    fd: RawFd,
    interest: Interest,
    callback: IoCallback,

    /// Token of the current registration.
    token: Option<u64>,

    /// Liveness flag of the current registration.
    active: Arc<AtomicBool>,

    /// Set by the first successful start.
    detach: Option<Arc<DetachQueue>>,
}

impl IoWatcher {
    /// Creates an inactive watcher for `fd`.
    pub fn new<F>(fd: RawFd, interest: Interest, callback: F) -> Self
    where
        F: FnMut(&Reactor, Ready) + Send + 'static,
    {
        Self {
            fd,
            interest,
            callback: Arc::new(Mutex::new(callback)),
            token: None,
            active: Arc::new(AtomicBool::new(false)),
            detach: None,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }
}

impl Watcher for IoWatcher {
    fn start(&mut self, reactor: &Reactor) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }

        let active = Arc::new(AtomicBool::new(true));
        let token = reactor.add_io(self.fd, self.interest, self.callback.clone(), active.clone())?;

        self.token = Some(token);
        self.active = active;
        self.detach.get_or_insert_with(|| reactor.detach_queue());
        Ok(())
    }

    fn stop(&mut self, reactor: &Reactor) {
        self.active.store(false, Ordering::Release);

        if let Some(token) = self.token.take() {
            reactor.remove_io(token);
        }
    }

    fn is_active(&self) -> bool {
        self.token.is_some() && self.active.load(Ordering::Acquire)
    }
}

impl Drop for IoWatcher {
    /// Detaches a watcher dropped while active.
    ///
    /// The reactor is not reachable from here: the registration is
    /// silenced at once and handed to the reactor thread, which
    /// deregisters it on its next iteration.
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);

        if let (Some(token), Some(detach)) = (self.token.take(), &self.detach) {
            detach.push(Detached::Io(token));
        }
    }
}
