use super::core::Reactor;
use super::event::{Event, Ready};
use super::poller::common::Interest;

use parking_lot::Mutex;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Callback of an I/O watcher, shared with the watcher so it survives
/// restarts.
pub(crate) type IoCallback = Arc<Mutex<dyn FnMut(&Reactor, Ready) + Send>>;

/// A file descriptor registered with the reactor for readiness.
pub(crate) struct IoEntry {
    pub(crate) fd: RawFd,

    /// Registration serial, encoded in the poller token next to the slab
    /// index. Stale events for a reused slot are recognised by it.
    pub(crate) serial: u32,

    pub(crate) interest: Interest,

    /// Liveness flag shared with the owning watcher. Cleared when the
    /// watcher is dropped without being stopped; the reactor then
    /// detaches the entry on its next event.
    pub(crate) active: Arc<AtomicBool>,

    pub(crate) callback: IoCallback,
}

impl IoEntry {
    /// Filters a raw event down to the readiness this entry asked for.
    ///
    /// Returns `None` when nothing the watcher is interested in happened.
    pub(crate) fn readiness(&self, event: &Event) -> Option<Ready> {
        let ready = Ready {
            readable: event.readable && self.interest.read,
            writable: event.writable && self.interest.write,
        };

        (ready.readable || ready.writable).then_some(ready)
    }
}
