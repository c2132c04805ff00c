/// A readiness event reported by the poller.
///
/// Produced by the poller and consumed by the reactor to dispatch the
/// I/O watcher registered under `token`.
pub(crate) struct Event {
    /// Token of the registered I/O entry (slab index and serial).
    pub(crate) token: u64,

    pub(crate) readable: bool,

    pub(crate) writable: bool,
}

/// Readiness delivered to an I/O watcher callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ready {
    /// The descriptor is readable (or hung up / in error).
    pub readable: bool,

    /// The descriptor is writable (or in error).
    pub writable: bool,
}
