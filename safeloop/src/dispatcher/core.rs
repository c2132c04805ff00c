use super::affinity::ThreadAffinity;
use super::builder::DispatcherBuilder;
use super::command::{CommandId, CommandQueue, Payload};
use super::rendezvous::{Completion, Outcome, Rendezvous};
use super::wakeup::{RearmOnUnwind, WakeupSignal};
use crate::error::Result;
use crate::reactor::{Reactor, SignalCallback};
use crate::trace::debug;
use crate::watcher::Watcher;

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

/// State shared between the dispatcher and its wakeup callback.
struct Shared {
    queue: CommandQueue,
    wakeup: WakeupSignal,
}

impl Shared {
    fn drain(&self, reactor: &Reactor) {
        let _rearm = RearmOnUnwind(&self.wakeup);
        self.queue.drain(reactor);
    }
}

/// Thread-safe front end of a single-threaded [`Reactor`].
///
/// The dispatcher owns the reactor and knows which thread drives it.
/// Operations called on that thread run inline; called anywhere else they
/// are queued as commands, the reactor is woken, and the reactor thread
/// runs them in submission order. Blocking operations (`run_sync`,
/// `start`, `stop`) park the caller until the reactor thread is done.
///
/// Share it by reference, typically as an `Arc<Dispatcher>`.
///
/// # Examples
///
/// ```rust,ignore
/// let dispatcher = Arc::new(Dispatcher::new(Reactor::new()?));
///
/// let driver = dispatcher.clone();
/// let handle = thread::spawn(move || {
///     driver.set_current_thread();
///     driver.run_loop()
/// });
///
/// let answer = dispatcher.run_sync(|| 6 * 7);
/// assert_eq!(answer, 42);
///
/// dispatcher.shutdown();
/// handle.join().unwrap()?;
/// ```
pub struct Dispatcher {
    reactor: Reactor,
    affinity: ThreadAffinity,
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Creates a dispatcher with the default configuration.
    ///
    /// Takes ownership of `reactor`; the calling thread becomes the
    /// reactor thread.
    pub fn new(reactor: Reactor) -> Self {
        DispatcherBuilder::new().build(reactor)
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub(crate) fn with_builder(reactor: Reactor, builder: DispatcherBuilder) -> Self {
        let shared = Arc::new(Shared {
            queue: CommandQueue::new(builder.max_command_id, builder.queue_capacity),
            wakeup: WakeupSignal::new(),
        });

        let target = shared.clone();
        let callback: SignalCallback =
            Arc::new(Mutex::new(move |reactor: &Reactor| target.drain(reactor)));
        shared.wakeup.bind(&reactor, callback);

        debug!(
            max_command_id = builder.max_command_id,
            "dispatcher created"
        );

        Self {
            reactor,
            affinity: ThreadAffinity::new(),
            shared,
        }
    }

    /// The owned reactor, for code that needs to bind to the same loop.
    ///
    /// Anything that mutates the reactor must run on the reactor thread.
    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// Makes the calling thread the reactor thread.
    ///
    /// Used when the loop is handed to another thread. The previous
    /// driver must have stopped driving the reactor first.
    pub fn set_current_thread(&self) {
        self.affinity.bind_current();
    }

    /// The current reactor thread.
    pub fn current_thread(&self) -> ThreadId {
        self.affinity.thread()
    }

    /// Whether the calling thread is the reactor thread. Lock-free.
    pub fn on_reactor_thread(&self) -> bool {
        self.affinity.is_current()
    }

    /// Drives the reactor until [`shutdown`](Self::shutdown) is called.
    ///
    /// # Panics
    ///
    /// Panics if called off the reactor thread.
    pub fn run_loop(&self) -> Result<()> {
        assert!(
            self.on_reactor_thread(),
            "run_loop called off the reactor thread"
        );

        self.reactor.run()
    }

    /// Asks the reactor loop to return. Callable from any thread.
    pub fn shutdown(&self) {
        self.reactor.break_loop();
    }

    /// Binds `watcher` to the reactor and starts it.
    ///
    /// From a foreign thread this blocks until the watcher is registered
    /// on the reactor thread.
    pub fn start<W>(&self, watcher: &mut W) -> Result<()>
    where
        W: Watcher + ?Sized,
    {
        if self.on_reactor_thread() {
            watcher.start(&self.reactor)
        } else {
            self.rendezvous(move |reactor| watcher.start(reactor))
        }
    }

    /// Stops `watcher`.
    ///
    /// From a foreign thread this blocks until the watcher is deregistered
    /// on the reactor thread.
    pub fn stop<W>(&self, watcher: &mut W)
    where
        W: Watcher + ?Sized,
    {
        if self.on_reactor_thread() {
            watcher.stop(&self.reactor);
        } else {
            self.rendezvous(move |reactor| watcher.stop(reactor));
        }
    }

    /// Runs `callback` on the reactor thread and returns its result.
    ///
    /// Inline on the reactor thread, otherwise the same as
    /// [`run_sync`](Self::run_sync).
    pub fn run<F, R>(&self, callback: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.on_reactor_thread() {
            callback()
        } else {
            self.run_sync(callback)
        }
    }

    /// Runs `callback` on the reactor thread, blocking until it returns.
    ///
    /// Everything the callback did is visible to the caller afterwards.
    /// On the reactor thread the callback simply runs inline.
    ///
    /// # Panics
    ///
    /// Panics if the callback panicked on the reactor thread, or if it was
    /// discarded unrun because the dispatcher was destroyed.
    pub fn run_sync<F, R>(&self, callback: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.on_reactor_thread() {
            return callback();
        }

        self.rendezvous(move |_| callback())
    }

    /// Queues `callback` for the reactor thread and returns at once.
    ///
    /// The returned id can be passed to
    /// [`cancel_command`](Self::cancel_command). The callback always goes
    /// through the queue, even when called on the reactor thread.
    pub fn run_later<F>(&self, callback: F) -> CommandId
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(move |_: &Reactor| callback()), true)
    }

    /// Arms a one-shot timer firing `callback` once, no earlier than
    /// `delay` from now.
    ///
    /// The timer cannot be cancelled.
    ///
    /// # Panics
    ///
    /// Panics if called off the reactor thread; use
    /// [`run_after_ts`](Self::run_after_ts) there.
    pub fn run_after<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        assert!(
            self.on_reactor_thread(),
            "run_after called off the reactor thread"
        );

        self.reactor.once(delay, move |_| callback());
    }

    /// Thread-safe [`run_after`](Self::run_after).
    ///
    /// Off the reactor thread the timer is armed by a queued command, so
    /// the delay starts counting when the reactor thread picks it up.
    pub fn run_after_ts<F>(&self, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.on_reactor_thread() {
            self.run_after(delay, callback);
        } else {
            self.submit(
                Box::new(move |reactor: &Reactor| reactor.once(delay, move |_| callback())),
                true,
            );
        }
    }

    /// Cancels a command queued by [`run_later`](Self::run_later).
    ///
    /// Returns `true` if the command was flagged before it started
    /// running, which guarantees it never runs. Returns `false` if it is
    /// running or done, was already canceled, or the id is unknown or
    /// [`CommandId::NONE`].
    pub fn cancel_command(&self, id: CommandId) -> bool {
        let canceled = self.shared.queue.cancel(id);

        debug!(%id, canceled, "cancel command");
        canceled
    }

    /// Number of queued commands that have not started yet.
    pub fn pending_commands(&self) -> usize {
        self.shared.queue.len()
    }

    /// Detaches the dispatcher from its reactor.
    ///
    /// Deregisters the wakeup signal and drops every command that has not
    /// run; callers blocked on one of them are woken with a panic. Using
    /// the dispatcher to submit work afterwards panics. Idempotent, and
    /// called automatically on drop.
    ///
    /// This mutates the reactor. Call it on the reactor thread, or once
    /// no thread is driving the loop any more (for instance after the
    /// thread running [`run_loop`](Self::run_loop) has been joined).
    pub fn destroy(&self) {
        let unbound = self.shared.wakeup.unbind(&self.reactor);
        let leftover = self.shared.queue.close();

        if unbound || !leftover.is_empty() {
            debug!(discarded = leftover.len(), "dispatcher destroyed");
        }

        drop(leftover);
    }

    fn submit(&self, payload: Payload, cancelable: bool) -> CommandId {
        let id = self.shared.queue.push(payload, cancelable);
        self.shared.wakeup.notify();
        id
    }

    /// Runs `task` on the reactor thread and blocks until it is done.
    fn rendezvous<F, R>(&self, task: F) -> R
    where
        F: FnOnce(&Reactor) -> R + Send,
        R: Send,
    {
        let completion = Completion::new();
        let mut slot: Option<R> = None;

        {
            let out = &mut slot;
            let rendezvous = Rendezvous::new(completion.clone(), move |reactor: &Reactor| {
                *out = Some(task(reactor));
            });

            // SAFETY: we block on `completion` below before `slot` or any
            // borrow captured by `task` goes out of scope.
            let payload = unsafe { rendezvous.into_payload() };
            self.submit(payload, false);
        }

        match (completion.wait(), slot) {
            (Outcome::Finished, Some(value)) => value,
            _ => panic!("command panicked or was discarded on the reactor thread"),
        }
    }
}

impl Drop for Dispatcher {
    /// Deregisters the wakeup signal before the reactor is released.
    fn drop(&mut self) {
        self.destroy();
    }
}
