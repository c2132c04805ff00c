use crate::trace::debug;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

/// Source of per-thread tokens. Starts at 1 so that 0 never matches.
static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Process-unique token of the current thread, assigned on first use.
    ///
    /// Comparing tokens is a plain integer comparison, which keeps the
    /// reactor-thread check O(1) and lock-free.
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Token of the calling thread, or 0 while its thread-locals are being
/// torn down.
fn current_token() -> u64 {
    THREAD_TOKEN.try_with(|token| *token).unwrap_or(0)
}

/// Records which thread is allowed to drive the reactor.
///
/// The owner only changes through [`bind_current`](Self::bind_current);
/// dispatch calls never rebind it implicitly. Rebinding while another
/// thread is still driving the reactor is the caller's responsibility.
pub(crate) struct ThreadAffinity {
    /// Token of the owning thread.
    token: AtomicU64,

    /// Identity of the owning thread, for reporting.
    thread: Mutex<ThreadId>,
}

impl ThreadAffinity {
    /// Creates a tracker owned by the calling thread.
    pub(crate) fn new() -> Self {
        Self {
            token: AtomicU64::new(current_token()),
            thread: Mutex::new(thread::current().id()),
        }
    }

    /// Hands ownership to the calling thread.
    pub(crate) fn bind_current(&self) {
        let id = thread::current().id();

        *self.thread.lock() = id;
        self.token.store(current_token(), Ordering::Release);

        debug!(thread = ?id, "reactor thread rebound");
    }

    /// Whether the calling thread is the owner.
    pub(crate) fn is_current(&self) -> bool {
        let token = current_token();
        token != 0 && self.token.load(Ordering::Acquire) == token
    }

    pub(crate) fn thread(&self) -> ThreadId {
        *self.thread.lock()
    }
}
