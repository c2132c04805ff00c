use std::io;
use std::os::fd::RawFd;

/// Errors reported by the reactor and its watchers.
///
/// Programmer errors (arming a reactor-only timer from a foreign thread,
/// an invalid builder value) are not represented here; they panic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The epoll instance or its wake-up eventfd could not be created.
    #[error("failed to create poller: {0}")]
    Poller(#[source] io::Error),

    /// A file descriptor could not be added to the poller.
    #[error("failed to register fd {fd}: {source}")]
    Register {
        fd: RawFd,
        #[source]
        source: io::Error,
    },

    /// Waiting for readiness events failed.
    #[error("failed to poll for events: {0}")]
    Poll(#[source] io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
