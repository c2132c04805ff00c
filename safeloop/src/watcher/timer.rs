use super::Watcher;
use crate::error::Result;
use crate::reactor::timer::{TimerAction, TimerCallback, TimerSlot};
use crate::reactor::{DetachQueue, Detached, Reactor};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// A cancellable one-shot or repeating timer.
///
/// Starting arms the timer `after` from now. With a `repeat` interval it
/// re-arms itself after every firing until stopped; without one it
/// becomes inactive once it has fired. A stopped timer can be started
/// again, which re-arms it from scratch.
///
/// Stopping removes the timer from the reactor right away. Dropping an
/// armed watcher cancels it; its entry is removed by the reactor thread
/// on the next loop iteration.
pub struct TimerWatcher {
    after: Duration,
    repeat: Option<Duration>,
    callback: TimerCallback,

    /// Current arming, shared with the reactor's timer entry.
    slot: Arc<TimerSlot>,

    /// Set by the first start.
    detach: Option<Arc<DetachQueue>>,
}

impl TimerWatcher {
    /// Creates an inactive timer.
    pub fn new<F>(after: Duration, repeat: Option<Duration>, callback: F) -> Self
    where
        F: FnMut(&Reactor) + Send + 'static,
    {
        Self {
            after,
            repeat,
            callback: Arc::new(Mutex::new(callback)),
            slot: TimerSlot::new(),
            detach: None,
        }
    }

    /// Changes the delay and interval used by the next start.
    pub fn set(&mut self, after: Duration, repeat: Option<Duration>) {
        self.after = after;
        self.repeat = repeat;
    }
}

impl Watcher for TimerWatcher {
    fn start(&mut self, reactor: &Reactor) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }

        self.detach.get_or_insert_with(|| reactor.detach_queue());

        reactor.add_timer(
            self.after,
            TimerAction::Watcher {
                callback: self.callback.clone(),
                repeat: self.repeat,
            },
            self.slot.clone(),
        );

        Ok(())
    }

    fn stop(&mut self, reactor: &Reactor) {
        reactor.remove_timer(&self.slot);
    }

    fn is_active(&self) -> bool {
        self.slot.is_armed()
    }
}

impl Drop for TimerWatcher {
    fn drop(&mut self) {
        if let (Some(key), Some(detach)) = (self.slot.take(), &self.detach) {
            detach.push(Detached::Timer(key));
        }
    }
}
