//! Cross-thread access to a single-threaded reactor.
//!
//! The [`Dispatcher`] owns a reactor and lets any thread:
//! - run closures on the reactor thread, blocking or fire-and-forget,
//! - arm one-shot timers,
//! - start and stop watchers,
//! - cancel deferred work that has not started yet.
//!
//! Work submitted from a foreign thread is queued as a command and the
//! reactor is woken through a dedicated async signal. The reactor thread
//! then drains the queue in submission order.

mod affinity;
mod builder;
mod command;
mod core;
mod rendezvous;
mod wakeup;

pub use builder::DispatcherBuilder;
pub use command::{CommandId, DEFAULT_MAX_COMMAND_ID};
pub use self::core::Dispatcher;
