use super::Dispatcher;
use super::command::DEFAULT_MAX_COMMAND_ID;
use crate::reactor::Reactor;

/// Builder for configuring and creating a [`Dispatcher`].
///
/// # Examples
///
/// ```rust,ignore
/// let dispatcher = Dispatcher::builder()
///     .max_command_id(1024)
///     .queue_capacity(64)
///     .build(Reactor::new()?);
/// ```
pub struct DispatcherBuilder {
    /// Largest command id before wrapping back to 1.
    pub(crate) max_command_id: u32,

    /// Initial capacity of the command queue.
    pub(crate) queue_capacity: usize,
}

impl DispatcherBuilder {
    /// Creates a builder with the default configuration: ids wrap after
    /// [`DEFAULT_MAX_COMMAND_ID`] and the queue starts with room for 16
    /// commands.
    pub fn new() -> Self {
        Self {
            max_command_id: DEFAULT_MAX_COMMAND_ID,
            queue_capacity: 16,
        }
    }

    /// Sets the largest command id issued before wrapping back to 1.
    ///
    /// A smaller id space makes reuse of an id still outstanding more
    /// likely under heavy backlog.
    ///
    /// # Panics
    ///
    /// Panics if `max == 0`.
    pub fn max_command_id(mut self, max: u32) -> Self {
        assert!(max > 0, "max_command_id must be > 0");

        self.max_command_id = max;
        self
    }

    /// Sets the initial capacity of the command queue.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Builds a dispatcher that takes ownership of `reactor`.
    ///
    /// The calling thread becomes the reactor thread.
    pub fn build(self, reactor: Reactor) -> Dispatcher {
        Dispatcher::with_builder(reactor, self)
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
