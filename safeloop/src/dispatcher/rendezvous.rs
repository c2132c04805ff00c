//! Blocking hand-off between a caller thread and the reactor thread.

use super::command::Payload;
use crate::reactor::Reactor;

use parking_lot::{Condvar, Mutex};
use std::mem;
use std::sync::Arc;

/// How a rendezvous command ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Not resolved yet.
    Pending,

    /// The task ran to completion.
    Finished,

    /// The task panicked or was dropped without running.
    Abandoned,
}

/// Per-call completion state: a mutex-guarded outcome plus the condition
/// variable the caller parks on.
pub(crate) struct Completion {
    outcome: Mutex<Outcome>,
    condvar: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(Outcome::Pending),
            condvar: Condvar::new(),
        })
    }

    /// Blocks until the outcome is resolved.
    ///
    /// Waits on the predicate, so spurious wake-ups are harmless.
    pub(crate) fn wait(&self) -> Outcome {
        let mut outcome = self.outcome.lock();

        while *outcome == Outcome::Pending {
            self.condvar.wait(&mut outcome);
        }

        *outcome
    }

    fn resolve(&self, outcome: Outcome) {
        *self.outcome.lock() = outcome;
        self.condvar.notify_all();
    }
}

/// A task lent to the reactor thread by a blocked caller.
///
/// The completion is resolved from `Drop`, after the task itself has been
/// consumed or dropped. Whatever the task borrows from the caller is
/// therefore released before the caller can resume, whether the task
/// finished, panicked or was discarded unrun.
pub(crate) struct Rendezvous<'a> {
    task: Option<Box<dyn FnOnce(&Reactor) + Send + 'a>>,
    completion: Arc<Completion>,
    finished: bool,
}

impl<'a> Rendezvous<'a> {
    pub(crate) fn new<F>(completion: Arc<Completion>, task: F) -> Self
    where
        F: FnOnce(&Reactor) + Send + 'a,
    {
        Self {
            task: Some(Box::new(task)),
            completion,
            finished: false,
        }
    }

    fn run(mut self, reactor: &Reactor) {
        if let Some(task) = self.task.take() {
            task(reactor);
            self.finished = true;
        }
    }

    /// Turns the rendezvous into a queue payload.
    ///
    /// # Safety
    ///
    /// The caller must block on the completion until it is resolved before
    /// letting anything borrowed for `'a` go out of scope. The completion
    /// is only resolved once the task has been dropped, so no borrow
    /// outlives its referent.
    pub(crate) unsafe fn into_payload(self) -> Payload {
        let payload: Box<dyn FnOnce(&Reactor) + Send + 'a> =
            Box::new(move |reactor: &Reactor| self.run(reactor));

        unsafe {
            mem::transmute::<Box<dyn FnOnce(&Reactor) + Send + 'a>, Payload>(payload)
        }
    }
}

impl Drop for Rendezvous<'_> {
    fn drop(&mut self) {
        drop(self.task.take());

        let outcome = if self.finished {
            Outcome::Finished
        } else {
            Outcome::Abandoned
        };
        self.completion.resolve(outcome);
    }
}
