use super::detach::{DetachQueue, Detached};
use super::event::{Event, Ready};
use super::io::{IoCallback, IoEntry};
use super::poller::Poller;
use super::poller::common::Interest;
use super::signal::{AsyncSignal, SignalCallback, SignalEntry};
use super::timer::{TimerAction, TimerEntry, TimerKey, TimerSlot};
use crate::error::{Error, Result};
use crate::trace::{trace, warn};
use crate::utils::Slab;

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::mem;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default capacity of the poller event buffer.
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A single-threaded event loop.
///
/// The reactor owns:
/// - an `epoll` poller with a cross-thread waker,
/// - a timer map ordered by deadline (one-shot timers and timer watchers),
/// - a registry of I/O sources,
/// - a registry of async signal sources.
///
/// Each iteration waits for the earliest of: an I/O event, the next timer
/// deadline, or a wake-up; then dispatches async signals first, I/O
/// readiness second and expired timers last.
///
/// The reactor is meant to be driven and mutated by one thread at a time.
/// Its internal state sits behind uncontended locks, so that a wrong-thread
/// call can only ever be a logic error, never a data race. No registry
/// lock is held while a callback runs: callbacks may arm timers, start and
/// stop watchers or break the loop.
///
/// Cross-thread access goes through [`Dispatcher`](crate::Dispatcher),
/// which takes ownership of the reactor.
pub struct Reactor {
    poller: Poller,

    /// Scratch buffer for the events of one iteration.
    events: Mutex<Vec<Event>>,

    timers: Mutex<BTreeMap<TimerKey, TimerEntry>>,

    io: Mutex<Slab<IoEntry>>,

    signals: Mutex<Slab<SignalEntry>>,

    /// Registrations left behind by dropped watchers.
    detached: Arc<DetachQueue>,

    /// Arming order of timers.
    timer_seq: AtomicU64,

    /// Registration serial of I/O entries.
    io_serial: AtomicU32,

    /// Set by [`break_loop`](Self::break_loop), consumed by the loop.
    stopped: AtomicBool,
}

impl Reactor {
    /// Creates a reactor with the default event buffer size.
    pub fn new() -> Result<Self> {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a reactor whose poller reports at most `events` readiness
    /// events per iteration.
    pub fn with_capacity(events: usize) -> Result<Self> {
        let poller = Poller::new(events).map_err(Error::Poller)?;
        let detached = DetachQueue::new(poller.waker());

        Ok(Self {
            poller,
            events: Mutex::new(Vec::with_capacity(events)),
            timers: Mutex::new(BTreeMap::new()),
            io: Mutex::new(Slab::with_capacity(64)),
            signals: Mutex::new(Slab::with_capacity(4)),
            detached,
            timer_seq: AtomicU64::new(0),
            io_serial: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
        })
    }

    /// Runs the loop until [`break_loop`](Self::break_loop) is called.
    ///
    /// A break requested before the loop starts makes it return after
    /// the check, without waiting.
    pub fn run(&self) -> Result<()> {
        loop {
            if self.stopped.swap(false, Ordering::AcqRel) {
                return Ok(());
            }

            self.run_once(None)?;
        }
    }

    /// Runs the loop for `duration`, or until a break is requested.
    ///
    /// Every timer whose deadline falls inside the window fires before this
    /// returns.
    pub fn run_for(&self, duration: Duration) -> Result<()> {
        let end = Instant::now() + duration;

        loop {
            if self.stopped.swap(false, Ordering::AcqRel) {
                return Ok(());
            }

            let now = Instant::now();
            if now >= end {
                // Deadlines equal to `end` are due now.
                return self.run_once(Some(Duration::ZERO));
            }

            self.run_once(Some(end - now))?;
        }
    }

    /// Runs a single loop iteration.
    ///
    /// Blocks for at most `timeout` (forever with `None`), shortened to the
    /// next timer deadline, or not at all when an async signal is pending.
    ///
    /// May be called from inside a callback to pump the loop. A source
    /// whose callback is the one currently running is not re-entered: an
    /// async signal stays pending, an I/O source is reported again by the
    /// next iteration and a timer is deferred to the next iteration.
    pub fn run_once(&self, timeout: Option<Duration>) -> Result<()> {
        self.reap_detached();

        let wait = if self.signal_pending() {
            Some(Duration::ZERO)
        } else {
            let next_timer = self
                .timers
                .lock()
                .first_key_value()
                .map(|(&(deadline, _), _)| deadline.saturating_duration_since(Instant::now()));

            match (next_timer, timeout) {
                (Some(timer), Some(timeout)) => Some(timer.min(timeout)),
                (timer, timeout) => timer.or(timeout),
            }
        };

        let mut events = mem::take(&mut *self.events.lock());

        self.poller.poll(&mut events, wait).map_err(|err| {
            warn!(error = %err, "poll failed");
            Error::Poll(err)
        })?;

        self.dispatch_signals();

        for event in &events {
            self.dispatch_io(event);
        }

        self.dispatch_timers();

        *self.events.lock() = events;

        Ok(())
    }

    /// Asks the loop to return.
    ///
    /// Callable from any thread: the request is recorded and the poller is
    /// woken, so a blocked wait returns promptly.
    pub fn break_loop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.poller.wake();
    }

    /// Arms a one-shot timer.
    ///
    /// `callback` runs exactly once, no earlier than `delay` from now, and
    /// is dropped right after. One-shot timers cannot be cancelled; use a
    /// [`TimerWatcher`](crate::TimerWatcher) for that.
    pub fn once<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce(&Reactor) + Send + 'static,
    {
        self.add_timer(delay, TimerAction::Once(Box::new(callback)), TimerSlot::new());
    }

    /// Number of armed timers.
    pub fn active_timers(&self) -> usize {
        self.timers.lock().len()
    }

    /// Number of file descriptors currently registered.
    pub fn active_io(&self) -> usize {
        self.io.lock().len()
    }

    /// Queue dropped watchers report their registrations to.
    pub(crate) fn detach_queue(&self) -> Arc<DetachQueue> {
        self.detached.clone()
    }

    pub(crate) fn add_timer(&self, delay: Duration, action: TimerAction, slot: Arc<TimerSlot>) {
        self.reap_detached();
        self.push_timer(Instant::now() + delay, action, slot);
        self.poller.wake();
    }

    fn push_timer(&self, deadline: Instant, action: TimerAction, slot: Arc<TimerSlot>) {
        let key = (deadline, self.timer_seq.fetch_add(1, Ordering::AcqRel));

        slot.arm(key);
        self.timers.lock().insert(key, TimerEntry { slot, action });
    }

    /// Disarms the timer tracked by `slot` and drops its entry.
    pub(crate) fn remove_timer(&self, slot: &TimerSlot) {
        if let Some(key) = slot.take() {
            self.timers.lock().remove(&key);
        }
    }

    /// Registers a file descriptor and returns its token.
    pub(crate) fn add_io(
        &self,
        fd: RawFd,
        interest: Interest,
        callback: IoCallback,
        active: Arc<AtomicBool>,
    ) -> Result<u64> {
        // A dropped watcher may still hold a registration for `fd`.
        self.reap_detached();

        let serial = self.io_serial.fetch_add(1, Ordering::Relaxed);
        let mut io = self.io.lock();

        let index = io.insert(IoEntry {
            fd,
            serial,
            interest,
            active,
            callback,
        });
        let token = encode_token(index, serial);

        if let Err(source) = self.poller.register(fd, token, interest) {
            io.remove(index);
            return Err(Error::Register { fd, source });
        }

        trace!(fd, token, "io source registered");
        Ok(token)
    }

    /// Deregisters the I/O source behind `token`. Unknown tokens are
    /// ignored.
    pub(crate) fn remove_io(&self, token: u64) {
        let (index, serial) = decode_token(token);
        let mut io = self.io.lock();

        if io.get(index).is_some_and(|e| e.serial == serial) {
            if let Some(entry) = io.remove(index) {
                self.poller.deregister(entry.fd);
                trace!(fd = entry.fd, token, "io source deregistered");
            }
        }
    }

    /// Registers an async signal source.
    pub(crate) fn add_signal(&self, callback: SignalCallback) -> AsyncSignal {
        let pending = Arc::new(AtomicBool::new(false));

        let key = self.signals.lock().insert(SignalEntry {
            pending: pending.clone(),
            callback,
        });

        AsyncSignal::new(key, pending, self.poller.waker())
    }

    /// Removes an async signal source. Returns `false` if it was already
    /// removed.
    pub(crate) fn remove_signal(&self, signal: &AsyncSignal) -> bool {
        self.signals.lock().remove(signal.key()).is_some()
    }

    /// Removes the registrations of watchers dropped since the last call.
    fn reap_detached(&self) {
        for detached in self.detached.take() {
            match detached {
                Detached::Io(token) => self.remove_io(token),
                Detached::Timer(key) => {
                    self.timers.lock().remove(&key);
                }
            }
        }
    }

    fn signal_pending(&self) -> bool {
        self.signals
            .lock()
            .iter()
            .any(|(_, s)| s.pending.load(Ordering::Acquire))
    }

    fn dispatch_signals(&self) {
        let fired: Vec<(Arc<AtomicBool>, SignalCallback)> = self
            .signals
            .lock()
            .iter()
            .filter(|(_, s)| s.pending.swap(false, Ordering::AcqRel))
            .map(|(_, s)| (s.pending.clone(), s.callback.clone()))
            .collect();

        for (pending, callback) in fired {
            match callback.try_lock() {
                Some(mut run) => (&mut *run)(self),
                // Fired from its own callback; picked up once that returns.
                None => pending.store(true, Ordering::Release),
            }
        }
    }

    fn dispatch_io(&self, event: &Event) {
        let (index, serial) = decode_token(event.token);

        let (callback, ready): (IoCallback, Ready) = {
            let mut io = self.io.lock();

            let Some(entry) = io.get(index).filter(|e| e.serial == serial) else {
                return;
            };

            if !entry.active.load(Ordering::Acquire) {
                if let Some(entry) = io.remove(index) {
                    self.poller.deregister(entry.fd);
                    trace!(fd = entry.fd, "detached dropped io source");
                }
                return;
            }

            match entry.readiness(event) {
                Some(ready) => (entry.callback.clone(), ready),
                None => return,
            }
        };

        // Level-triggered: a source skipped here is reported again.
        if let Some(mut run) = callback.try_lock() {
            (&mut *run)(self, ready);
        }
    }

    /// Fires every timer that is due.
    ///
    /// Timers armed while this runs (including re-armed repeating timers)
    /// wait for the next iteration.
    fn dispatch_timers(&self) {
        let now = Instant::now();
        let horizon = self.timer_seq.load(Ordering::Acquire);

        loop {
            let due = {
                let mut timers = self.timers.lock();
                match timers.first_key_value() {
                    Some((&(deadline, seq), _)) if deadline <= now && seq < horizon => {
                        timers.pop_first()
                    }
                    _ => None,
                }
            };

            let Some((key, entry)) = due else {
                break;
            };

            match entry.action {
                TimerAction::Once(callback) => {
                    if entry.slot.take_if(key) {
                        callback(self);
                    }
                }

                TimerAction::Watcher { callback, repeat } => {
                    if !entry.slot.is_armed_with(key) {
                        continue;
                    }

                    let Some(mut run) = callback.try_lock() else {
                        // Still running further up the stack.
                        self.push_timer(
                            now,
                            TimerAction::Watcher {
                                callback: callback.clone(),
                                repeat,
                            },
                            entry.slot,
                        );
                        continue;
                    };

                    match repeat {
                        Some(interval) => {
                            let next = (key.0 + interval).max(now);
                            self.push_timer(
                                next,
                                TimerAction::Watcher {
                                    callback: callback.clone(),
                                    repeat,
                                },
                                entry.slot,
                            );
                        }
                        None => {
                            entry.slot.take_if(key);
                        }
                    }

                    (&mut *run)(self);
                }
            }
        }
    }
}

/// Packs a slab index and a registration serial into a poller token.
fn encode_token(index: usize, serial: u32) -> u64 {
    (u64::from(serial) << 32) | (index as u64 & 0xFFFF_FFFF)
}

fn decode_token(token: u64) -> (usize, u32) {
    ((token & 0xFFFF_FFFF) as usize, (token >> 32) as u32)
}
