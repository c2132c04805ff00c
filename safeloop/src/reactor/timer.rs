use super::core::Reactor;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callback of a one-shot timer; consumed by its single firing.
pub(crate) type OnceCallback = Box<dyn FnOnce(&Reactor) + Send>;

/// Callback of a timer watcher, shared with the watcher so it survives
/// restarts.
pub(crate) type TimerCallback = Arc<Mutex<dyn FnMut(&Reactor) + Send>>;

/// Position of an armed timer in the reactor's timer map.
///
/// Ordered by deadline; `seq` breaks ties so timers sharing a deadline
/// fire in the order they were armed.
pub(crate) type TimerKey = (Instant, u64);

/// What happens when a timer entry expires.
pub(crate) enum TimerAction {
    /// Fire once, then release the callback.
    Once(OnceCallback),

    /// Fire, then re-arm after `repeat` if one is set.
    Watcher {
        callback: TimerCallback,
        repeat: Option<Duration>,
    },
}

/// An armed timer.
pub(crate) struct TimerEntry {
    /// Shared with the owning watcher; tracks where the timer sits.
    pub(crate) slot: Arc<TimerSlot>,

    pub(crate) action: TimerAction,
}

/// The key of a timer's current arming, shared between the reactor and
/// the owner of the timer.
///
/// A repeating timer moves to a new key every time it re-arms. Taking the
/// key disarms the timer: an entry whose key no longer matches its slot is
/// discarded instead of fired.
pub(crate) struct TimerSlot {
    key: Mutex<Option<TimerKey>>,
}

impl TimerSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            key: Mutex::new(None),
        })
    }

    pub(crate) fn arm(&self, key: TimerKey) {
        *self.key.lock() = Some(key);
    }

    /// Disarms the slot, returning the key it was armed with.
    pub(crate) fn take(&self) -> Option<TimerKey> {
        self.key.lock().take()
    }

    /// Disarms the slot if it is still armed with `key`.
    pub(crate) fn take_if(&self, key: TimerKey) -> bool {
        let mut current = self.key.lock();

        if *current == Some(key) {
            *current = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_armed_with(&self, key: TimerKey) -> bool {
        *self.key.lock() == Some(key)
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.key.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::TimerSlot;

    use std::time::Instant;

    #[test]
    fn test_slot_take_if_only_matches_current_key() {
        let slot = TimerSlot::new();
        let now = Instant::now();

        slot.arm((now, 1));
        assert!(!slot.take_if((now, 0)), "stale key must not disarm");
        assert!(slot.is_armed_with((now, 1)));

        assert!(slot.take_if((now, 1)));
        assert!(!slot.is_armed());
        assert_eq!(slot.take(), None);
    }
}
