mod common;

use common::{local_dispatcher, local_dispatcher_with, spawn_loop};
use safeloop::{CommandId, Dispatcher};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

#[test]
fn test_run_later_returns_before_running() {
    let dispatcher = local_dispatcher();
    let ran = Arc::new(AtomicBool::new(false));

    let flag = ran.clone();
    let id = dispatcher.run_later(move || flag.store(true, Ordering::SeqCst));

    assert!(!id.is_none());
    assert!(!ran.load(Ordering::SeqCst), "must not run before a drain");
    assert_eq!(dispatcher.pending_commands(), 1);

    dispatcher
        .reactor()
        .run_once(Some(Duration::ZERO))
        .unwrap();

    assert!(ran.load(Ordering::SeqCst), "drained on the next iteration");
    assert_eq!(dispatcher.pending_commands(), 0);
}

#[test]
fn test_run_later_ids_wrap_and_skip_zero() {
    let dispatcher = local_dispatcher_with(Dispatcher::builder().max_command_id(3));

    let ids: Vec<u32> = (0..7)
        .map(|_| dispatcher.run_later(|| {}).get())
        .collect();

    assert_eq!(ids, vec![1, 2, 3, 1, 2, 3, 1]);
    assert!(ids.iter().all(|&id| id != CommandId::NONE.get()));
}

#[test]
fn test_run_later_default_ids_start_at_one() {
    let dispatcher = local_dispatcher();

    assert_eq!(dispatcher.run_later(|| {}).get(), 1);
    assert_eq!(dispatcher.run_later(|| {}).get(), 2);
}

#[test]
fn test_run_later_exactly_once_across_threads() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 250;

    let lp = spawn_loop();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let dispatcher = lp.dispatcher.clone();
            let seen = seen.clone();

            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let seen = seen.clone();
                    dispatcher.run_later(move || seen.lock().unwrap().push((t, i)));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Queued after every submission above, so it runs after all of them.
    lp.dispatcher.run_sync(|| {});

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), THREADS * PER_THREAD);

    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD, "no callback ran twice");

    for t in 0..THREADS {
        let order: Vec<usize> = seen.iter().filter(|(s, _)| *s == t).map(|(_, i)| *i).collect();
        assert_eq!(
            order,
            (0..PER_THREAD).collect::<Vec<_>>(),
            "submissions of one thread keep their order"
        );
    }
}

#[test]
fn test_run_later_lock_order_between_threads() {
    let dispatcher = local_dispatcher();
    let log = Arc::new(Mutex::new(Vec::new()));
    let (a_done_tx, a_done_rx) = mpsc::channel();

    let a = {
        let dispatcher = dispatcher.clone();
        let log = log.clone();
        thread::spawn(move || {
            dispatcher.run_later(move || log.lock().unwrap().push("A"));
            a_done_tx.send(()).unwrap();
        })
    };

    let b = {
        let dispatcher = dispatcher.clone();
        let log = log.clone();
        thread::spawn(move || {
            a_done_rx.recv().unwrap();
            dispatcher.run_later(move || log.lock().unwrap().push("B"));
        })
    };

    a.join().unwrap();
    b.join().unwrap();

    assert!(log.lock().unwrap().is_empty(), "nothing runs before the drain");

    dispatcher
        .reactor()
        .run_once(Some(Duration::ZERO))
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["A", "B"]);
}

#[test]
fn test_run_later_on_reactor_thread_is_deferred() {
    let lp = spawn_loop();
    let (tx, rx) = mpsc::channel();

    let dispatcher = lp.dispatcher.clone();
    lp.dispatcher.run_sync(move || {
        let tx2 = tx.clone();
        dispatcher.run_later(move || tx2.send("later").unwrap());
        tx.send("sync").unwrap();
    });

    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "sync");
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "later");
}

#[test]
fn test_command_may_pump_the_loop() {
    let dispatcher = local_dispatcher();
    let ran = Arc::new(AtomicBool::new(false));

    let inner = dispatcher.clone();
    let flag = ran.clone();
    dispatcher.run_later(move || {
        inner.run_later(move || flag.store(true, Ordering::SeqCst));
        inner.reactor().run_once(Some(Duration::ZERO)).unwrap();
    });

    dispatcher
        .reactor()
        .run_once(Some(Duration::ZERO))
        .unwrap();
    assert!(!ran.load(Ordering::SeqCst), "the drain is not re-entered");
    assert_eq!(dispatcher.pending_commands(), 1);

    dispatcher
        .reactor()
        .run_once(Some(Duration::ZERO))
        .unwrap();
    assert!(ran.load(Ordering::SeqCst), "runs on the next iteration");
}
