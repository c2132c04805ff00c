use crate::reactor::Reactor;
use crate::trace::trace;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

/// Default upper bound of command ids, `2^28 - 1`.
pub const DEFAULT_MAX_COMMAND_ID: u32 = (1 << 28) - 1;

/// Work shipped to the reactor thread.
pub(crate) type Payload = Box<dyn FnOnce(&Reactor) + Send>;

/// Identifier of a queued command.
///
/// Ids are issued in increasing order and wrap back to 1 after the
/// configured maximum, so they are unique only among commands that are
/// outstanding at the same time. `CommandId::NONE` (0) is never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u32);

impl CommandId {
    /// The "no command" sentinel.
    pub const NONE: CommandId = CommandId(0);

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for CommandId {
    fn from(id: u32) -> Self {
        CommandId(id)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A queued unit of work.
pub(crate) struct Command {
    pub(crate) id: CommandId,

    /// Set by a successful cancel; the drain skips the command.
    pub(crate) canceled: bool,

    /// Rendezvous commands are never cancelable: their caller is blocked
    /// on them and their id is not handed out.
    pub(crate) cancelable: bool,

    pub(crate) payload: Payload,
}

/// Monotonic id generator wrapping from `max` back to 1.
pub(crate) struct IdSequence {
    next: u32,
    max: u32,
}

impl IdSequence {
    pub(crate) fn new(max: u32) -> Self {
        assert!(max > 0, "max_command_id must be > 0");
        Self { next: 1, max }
    }

    pub(crate) fn next(&mut self) -> CommandId {
        let id = self.next;

        self.next = if id >= self.max { 1 } else { id + 1 };

        CommandId(id)
    }
}

/// State guarded by the queue lock.
struct Pending {
    ids: IdSequence,

    /// Commands submitted since the last drain started.
    queued: Vec<Command>,

    /// Batch detached by the drain in progress, in enqueue order.
    /// Commands leave it right before they run.
    in_flight: VecDeque<Command>,

    /// Set once the owning dispatcher has been destroyed.
    closed: bool,
}

/// The mutex-protected queue of commands waiting for the reactor thread.
pub(crate) struct CommandQueue {
    pending: Mutex<Pending>,
}

impl CommandQueue {
    pub(crate) fn new(max_id: u32, capacity: usize) -> Self {
        Self {
            pending: Mutex::new(Pending {
                ids: IdSequence::new(max_id),
                queued: Vec::with_capacity(capacity),
                in_flight: VecDeque::with_capacity(capacity),
                closed: false,
            }),
        }
    }

    /// Appends a command and returns its id.
    ///
    /// # Panics
    ///
    /// Panics if the queue has been closed.
    pub(crate) fn push(&self, payload: Payload, cancelable: bool) -> CommandId {
        let mut pending = self.pending.lock();
        assert!(!pending.closed, "dispatcher used after destroy");

        let id = pending.ids.next();
        pending.queued.push(Command {
            id,
            canceled: false,
            cancelable,
            payload,
        });

        trace!(%id, cancelable, queued = pending.queued.len(), "command submitted");
        id
    }

    /// Flags command `id` as canceled.
    ///
    /// Returns `true` only when this call flipped the flag of a cancelable
    /// command that has not started running. Both the queued commands and
    /// the not-yet-started part of the in-flight batch are searched.
    pub(crate) fn cancel(&self, id: CommandId) -> bool {
        if id.is_none() {
            return false;
        }

        let mut pending = self.pending.lock();
        let pending = &mut *pending;

        let command = pending
            .in_flight
            .iter_mut()
            .chain(pending.queued.iter_mut())
            .find(|c| c.id == id && c.cancelable);

        match command {
            Some(command) if !command.canceled => {
                command.canceled = true;
                true
            }
            _ => false,
        }
    }

    /// Runs every pending command on the calling (reactor) thread.
    ///
    /// The queued batch is detached under the lock in one step, so new
    /// submissions start the next batch instead of stalling. Each command
    /// is then popped under a short lock and run without it, in enqueue
    /// order. Canceled commands are dropped unrun.
    ///
    /// A panicking command unwinds out of here; the rest of its batch
    /// stays in flight and runs first on the next drain.
    pub(crate) fn drain(&self, reactor: &Reactor) {
        let batch = {
            let mut pending = self.pending.lock();
            let pending = &mut *pending;

            pending.in_flight.extend(pending.queued.drain(..));
            pending.in_flight.len()
        };

        if batch == 0 {
            return;
        }

        trace!(batch, "draining commands");

        let mut skipped = 0usize;

        loop {
            let next = self.pending.lock().in_flight.pop_front();

            let Some(command) = next else {
                break;
            };

            if command.canceled {
                skipped += 1;
                continue;
            }

            (command.payload)(reactor);
        }

        trace!(batch, skipped, "commands drained");
    }

    /// Closes the queue and returns every command still waiting, so the
    /// caller can drop them outside the lock.
    pub(crate) fn close(&self) -> Vec<Command> {
        let mut pending = self.pending.lock();
        let pending = &mut *pending;

        pending.closed = true;

        let mut leftover: Vec<Command> = pending.in_flight.drain(..).collect();
        leftover.append(&mut pending.queued);
        leftover
    }

    /// Number of commands not yet started, canceled ones included.
    pub(crate) fn len(&self) -> usize {
        let pending = self.pending.lock();
        pending.queued.len() + pending.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{CommandId, CommandQueue, IdSequence};

    #[test]
    fn test_id_sequence_wraps_to_one() {
        let mut ids = IdSequence::new(3);

        let issued: Vec<u32> = (0..7).map(|_| ids.next().get()).collect();
        assert_eq!(issued, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    #[should_panic(expected = "max_command_id must be > 0")]
    fn test_id_sequence_zero_max_panics() {
        let _ = IdSequence::new(0);
    }

    #[test]
    fn test_cancel_flips_once() {
        let queue = CommandQueue::new(100, 4);

        let id = queue.push(Box::new(|_| {}), true);
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id), "second cancel must not flip again");
        assert_eq!(queue.len(), 1, "canceled commands stay until drained");
    }

    #[test]
    fn test_cancel_ignores_rendezvous_commands() {
        let queue = CommandQueue::new(100, 4);

        let id = queue.push(Box::new(|_| {}), false);
        assert!(!queue.cancel(id));
        assert!(!queue.cancel(CommandId::NONE));
        assert!(!queue.cancel(CommandId::from(99)));
    }

    #[test]
    fn test_close_returns_leftovers() {
        let queue = CommandQueue::new(100, 4);

        queue.push(Box::new(|_| {}), true);
        queue.push(Box::new(|_| {}), true);

        let leftover = queue.close();
        assert_eq!(leftover.len(), 2);
        assert_eq!(leftover[0].id.get(), 1);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    #[should_panic(expected = "dispatcher used after destroy")]
    fn test_push_after_close_panics() {
        let queue = CommandQueue::new(100, 4);
        let _ = queue.close();

        queue.push(Box::new(|_| {}), true);
    }
}
