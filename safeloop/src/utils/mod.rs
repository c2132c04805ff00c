//! Small data structures used internally by the reactor.

mod slab;

pub(crate) use slab::Slab;
