//! The single-threaded reactor.
//!
//! The reactor is responsible for:
//! - waiting for I/O readiness through the platform poller,
//! - firing one-shot and repeating timers,
//! - running async signal callbacks raised from other threads.
//!
//! It is driven by exactly one thread at a time. Other threads reach it
//! through the [`Dispatcher`](crate::Dispatcher), which owns it.

mod core;
mod detach;
mod event;
mod io;
mod signal;

pub(crate) mod poller;
pub(crate) mod timer;

pub use self::core::Reactor;
pub use event::Ready;
pub use poller::common::Interest;

pub(crate) use detach::{DetachQueue, Detached};
pub(crate) use io::IoCallback;
pub(crate) use signal::{AsyncSignal, SignalCallback};
