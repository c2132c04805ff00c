//! Linux `epoll`-based poller.
//!
//! Responsibilities:
//! - register file descriptors with read/write interests,
//! - block waiting for readiness, bounded by an optional timeout,
//! - wake up early when another thread signals the internal `eventfd`.

use super::common::{Interest, Waker};
use crate::reactor::event::Event;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT,
    epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use parking_lot::Mutex;
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::time::Duration;

/// Reserved token for the wake-up eventfd.
///
/// I/O tokens carry a slab index in their low 32 bits, which never
/// reaches `u32::MAX`, so `u64::MAX` never collides.
const WAKE_TOKEN: u64 = u64::MAX;

/// Linux `epoll` poller.
///
/// Owns the epoll instance, the wake-up [`Waker`] and a reusable buffer of
/// raw events.
pub(crate) struct EpollPoller {
    epoll: RawFd,
    events: Mutex<Vec<epoll_event>>,
    waker: Arc<Waker>,
}

impl EpollPoller {
    /// Creates the epoll instance and registers the wake-up eventfd as a
    /// persistent read source.
    pub(crate) fn new(capacity: usize) -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        let waker = match Waker::new() {
            Ok(waker) => waker,
            Err(err) => {
                unsafe { libc::close(epoll) };
                return Err(err);
            }
        };

        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };

        let rc = unsafe { epoll_ctl(epoll, EPOLL_CTL_ADD, waker.fd(), &mut event) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(epoll) };
            return Err(err);
        }

        Ok(Self {
            epoll,
            events: Mutex::new(Vec::with_capacity(capacity.max(1))),
            waker: Arc::new(waker),
        })
    }

    pub(crate) fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    /// Wakes a blocked [`poll`](Self::poll) from any thread.
    pub(crate) fn wake(&self) {
        self.waker.wake();
    }

    /// Adds a file descriptor to the interest list.
    pub(crate) fn register(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        let mut flags = 0;

        if interest.read {
            flags |= EPOLLIN;
        }
        if interest.write {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: token,
        };

        let rc = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_ADD, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    /// Removes a file descriptor from the interest list.
    ///
    /// Failure is ignored: a descriptor closed by its owner has already
    /// been dropped from the interest list by the kernel.
    pub(crate) fn deregister(&self, fd: RawFd) {
        unsafe {
            epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, std::ptr::null_mut());
        }
    }

    /// Waits for readiness events.
    ///
    /// Returns when a descriptor is ready, the waker fires, or the timeout
    /// elapses. The timeout is rounded up to whole milliseconds so that a
    /// timer never fires before its deadline. `EINTR` is reported as an
    /// empty wait.
    pub(crate) fn poll(&self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = timeout
            .map(|t| {
                let ms = t.as_nanos().div_ceil(1_000_000);
                ms.min(i32::MAX as u128) as i32
            })
            .unwrap_or(-1);

        events.clear();

        let mut buffer = self.events.lock();
        buffer.clear();

        let n = unsafe {
            epoll_wait(
                self.epoll,
                buffer.as_mut_ptr(),
                buffer.capacity() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        unsafe {
            buffer.set_len(n as usize);
        }

        for ev in buffer.iter() {
            let token = ev.u64;
            let flags = ev.events;

            if token == WAKE_TOKEN {
                self.waker.reset();
                continue;
            }

            let readable = flags & ((EPOLLIN | EPOLLERR | EPOLLHUP) as u32) != 0;
            let writable = flags & ((EPOLLOUT | EPOLLERR) as u32) != 0;

            if let Some(e) = events.iter_mut().find(|e| e.token == token) {
                e.readable |= readable;
                e.writable |= writable;
            } else {
                events.push(Event {
                    token,
                    readable,
                    writable,
                });
            }
        }

        Ok(())
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        unsafe { libc::close(self.epoll) };
    }
}
