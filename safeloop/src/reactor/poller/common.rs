use crate::trace::warn;

use std::io;
use std::os::fd::RawFd;

/// Readiness a watcher wants to be notified about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interest {
    pub(crate) read: bool,
    pub(crate) write: bool,
}

impl Interest {
    /// Notify when the descriptor becomes readable.
    pub const READABLE: Interest = Interest {
        read: true,
        write: false,
    };

    /// Notify when the descriptor becomes writable.
    pub const WRITABLE: Interest = Interest {
        read: false,
        write: true,
    };

    /// Notify on either direction.
    pub const BOTH: Interest = Interest {
        read: true,
        write: true,
    };

    pub fn is_readable(self) -> bool {
        self.read
    }

    pub fn is_writable(self) -> bool {
        self.write
    }
}

/// Cross-thread wake-up handle for a blocked poller.
///
/// Wraps the poller's `eventfd`. Any thread may call [`wake`](Self::wake);
/// the descriptor is closed once the last handle is dropped.
pub(crate) struct Waker(RawFd);

impl Waker {
    /// Creates a non-blocking, close-on-exec `eventfd`.
    pub(crate) fn new() -> io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self(fd))
    }

    pub(crate) fn fd(&self) -> RawFd {
        self.0
    }

    /// Interrupts the poller.
    ///
    /// Writing to the eventfd makes it readable, which returns the
    /// blocked `epoll_wait` immediately. The counter saturating (`EAGAIN`)
    /// still leaves the descriptor readable, so that error is ignored.
    pub(crate) fn wake(&self) {
        let buf: u64 = 1;
        let rc = unsafe { libc::write(self.0, &buf as *const u64 as *const _, 8) };

        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                warn!(error = %err, "failed to wake poller");
            }
        }
    }

    /// Resets the eventfd counter after a wake-up was observed.
    pub(crate) fn reset(&self) {
        let mut buf = 0u64;
        unsafe {
            libc::read(self.0, &mut buf as *mut u64 as *mut _, 8);
        }
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        unsafe { libc::close(self.0) };
    }
}
