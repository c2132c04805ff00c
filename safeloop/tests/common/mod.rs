#![allow(dead_code)]

use safeloop::{Dispatcher, DispatcherBuilder, Reactor};

use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle, ThreadId};

/// A dispatcher whose reactor is driven by a dedicated thread.
pub struct LoopThread {
    pub dispatcher: Arc<Dispatcher>,
    pub thread: ThreadId,
    handle: Option<JoinHandle<safeloop::Result<()>>>,
}

impl LoopThread {
    /// Stops the loop and returns how the loop thread ended.
    pub fn join(mut self) -> thread::Result<safeloop::Result<()>> {
        self.dispatcher.shutdown();
        self.handle.take().expect("joined twice").join()
    }
}

impl Drop for LoopThread {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.dispatcher.shutdown();
            let _ = handle.join();
        }
    }
}

/// Builds a dispatcher on the calling thread, without driving it.
///
/// The calling thread is the reactor thread; tests drive the loop by
/// hand through `dispatcher.reactor()`.
pub fn local_dispatcher() -> Arc<Dispatcher> {
    local_dispatcher_with(Dispatcher::builder())
}

pub fn local_dispatcher_with(builder: DispatcherBuilder) -> Arc<Dispatcher> {
    safeloop::init_tracing();

    let reactor = Reactor::new().expect("failed to create reactor");
    Arc::new(builder.build(reactor))
}

/// Builds a dispatcher and hands its loop to a new thread.
///
/// Returns once the loop thread has become the reactor thread.
pub fn spawn_loop() -> LoopThread {
    spawn_loop_with(Dispatcher::builder())
}

pub fn spawn_loop_with(builder: DispatcherBuilder) -> LoopThread {
    let dispatcher = local_dispatcher_with(builder);
    let (ready_tx, ready_rx) = mpsc::channel();

    let driver = dispatcher.clone();
    let handle = thread::Builder::new()
        .name("reactor".into())
        .spawn(move || {
            driver.set_current_thread();
            let _ = ready_tx.send(thread::current().id());
            driver.run_loop()
        })
        .expect("failed to spawn reactor thread");

    let thread = ready_rx.recv().expect("reactor thread died");

    LoopThread {
        dispatcher,
        thread,
        handle: Some(handle),
    }
}
