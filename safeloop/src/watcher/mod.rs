//! Event sources that can be bound to a reactor.
//!
//! A watcher is owned by whoever created it, usually on the caller's own
//! stack. Starting it binds it to a reactor and registers it; stopping it
//! deregisters it. Both must happen on the reactor thread, which is what
//! [`Dispatcher::start`](crate::Dispatcher::start) and
//! [`Dispatcher::stop`](crate::Dispatcher::stop) guarantee for callers on
//! other threads.

mod io;
mod timer;

pub use io::IoWatcher;
pub use timer::TimerWatcher;

use crate::error::Result;
use crate::reactor::Reactor;

/// An event source with a start/stop lifecycle on a reactor.
///
/// Implementations must be `Send`: an off-thread caller lends its watcher
/// to the reactor thread for the duration of a start or stop.
pub trait Watcher: Send {
    /// Binds the watcher to `reactor` and starts it.
    ///
    /// Starting an active watcher is a no-op.
    fn start(&mut self, reactor: &Reactor) -> Result<()>;

    /// Stops the watcher. Stopping an inactive watcher is a no-op.
    fn stop(&mut self, reactor: &Reactor);

    /// Whether the watcher is currently registered and able to fire.
    fn is_active(&self) -> bool;
}
