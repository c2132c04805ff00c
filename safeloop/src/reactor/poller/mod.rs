//! Platform I/O poller.
//!
//! The reactor uses the poller to:
//! - wait for I/O readiness on registered file descriptors,
//! - be interrupted from another thread through the [`Waker`],
//! - sleep until the next timer deadline via the wait timeout.
//!
//! Only the Linux `epoll` backend is provided.

pub(crate) mod common;

pub(crate) use common::Waker;

#[cfg(target_os = "linux")]
mod epoll;

#[cfg(target_os = "linux")]
pub(crate) type Poller = epoll::EpollPoller;
