//! # safeloop
//!
//! **safeloop** lets any thread safely work with a single-threaded reactor.
//!
//! A reactor (event loop) must only ever be driven and mutated from one
//! thread. safeloop pairs a small `epoll` reactor with a [`Dispatcher`]
//! that confines every reactor mutation to that thread while still
//! letting other threads:
//!
//! - **run closures** on the reactor thread, blocking until they return
//!   ([`Dispatcher::run_sync`]) or fire-and-forget ([`Dispatcher::run_later`]),
//! - **arm one-shot timers** ([`Dispatcher::run_after_ts`]),
//! - **start and stop watchers** such as [`IoWatcher`] and [`TimerWatcher`],
//! - **cancel deferred work** that has not started yet
//!   ([`Dispatcher::cancel_command`]).
//!
//! Commands from foreign threads are queued under a lock and the reactor
//! is interrupted through a highest-priority async signal. The reactor
//! thread then runs the queued batch in submission order, exactly once
//! per command.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use safeloop::{Dispatcher, Reactor};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! fn main() -> safeloop::Result<()> {
//!     let dispatcher = Arc::new(Dispatcher::new(Reactor::new()?));
//!
//!     // Hand the loop to a dedicated thread.
//!     let driver = dispatcher.clone();
//!     let handle = thread::spawn(move || {
//!         driver.set_current_thread();
//!         driver.run_loop()
//!     });
//!
//!     // Back on the caller thread.
//!     let sum = dispatcher.run_sync(|| 40 + 2);
//!     assert_eq!(sum, 42);
//!
//!     let id = dispatcher.run_later(|| println!("maybe later"));
//!     dispatcher.cancel_command(id);
//!
//!     dispatcher.run_after_ts(Duration::from_millis(10), || println!("tick"));
//!
//!     dispatcher.shutdown();
//!     handle.join().unwrap()
//! }
//! ```
//!
//! ## Modules
//!
//! - [`Dispatcher`]: cross-thread command dispatch
//! - [`Reactor`]: the single-threaded event loop
//! - [`watcher`]: event sources with a start/stop lifecycle
//!
//! ## Logging
//!
//! With the default `tracing` feature the crate emits `tracing` events
//! under the `safeloop` target; [`init_tracing`] installs a basic
//! subscriber.

mod dispatcher;
mod error;
mod reactor;
mod trace;
mod utils;

pub mod watcher;

pub use dispatcher::{CommandId, DEFAULT_MAX_COMMAND_ID, Dispatcher, DispatcherBuilder};
pub use error::{Error, Result};
pub use reactor::{Interest, Reactor, Ready};
pub use trace::init_tracing;
pub use watcher::{IoWatcher, TimerWatcher, Watcher};
