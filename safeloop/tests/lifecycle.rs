mod common;

use common::{local_dispatcher, spawn_loop};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Flags when it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_destroy_discards_pending_commands() {
    let dispatcher = local_dispatcher();
    let ran = Arc::new(AtomicBool::new(false));

    let flag = ran.clone();
    dispatcher.run_later(move || flag.store(true, Ordering::SeqCst));
    assert_eq!(dispatcher.pending_commands(), 1);

    dispatcher.destroy();
    assert_eq!(dispatcher.pending_commands(), 0);

    dispatcher
        .reactor()
        .run_once(Some(Duration::ZERO))
        .unwrap();

    assert!(!ran.load(Ordering::SeqCst), "discarded command must not run");
}

#[test]
fn test_destroy_is_idempotent() {
    let dispatcher = local_dispatcher();

    dispatcher.destroy();
    dispatcher.destroy();
}

#[test]
#[should_panic(expected = "dispatcher used after destroy")]
fn test_run_later_after_destroy_panics() {
    let dispatcher = local_dispatcher();
    dispatcher.destroy();

    dispatcher.run_later(|| {});
}

#[test]
fn test_drop_releases_unrun_callbacks() {
    let dispatcher = local_dispatcher();
    let ran = Arc::new(AtomicBool::new(false));
    let dropped = Arc::new(AtomicBool::new(false));

    let flag = ran.clone();
    let guard = DropFlag(dropped.clone());
    dispatcher.run_later(move || {
        let _guard = guard;
        flag.store(true, Ordering::SeqCst);
    });

    drop(dispatcher);

    assert!(dropped.load(Ordering::SeqCst), "callback was released");
    assert!(!ran.load(Ordering::SeqCst), "callback never ran");
}

#[test]
fn test_destroy_wakes_blocked_caller() {
    let dispatcher = local_dispatcher();

    let caller = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || {
            panic::catch_unwind(AssertUnwindSafe(|| dispatcher.run_sync(|| 1)))
        })
    };

    let deadline = Instant::now() + Duration::from_secs(2);
    while dispatcher.pending_commands() == 0 {
        assert!(Instant::now() < deadline, "command never queued");
        thread::sleep(Duration::from_millis(1));
    }

    dispatcher.destroy();

    let outcome = caller.join().unwrap();
    assert!(outcome.is_err(), "blocked caller is woken with a panic");
}

#[test]
fn test_set_current_thread_hands_over() {
    let dispatcher = local_dispatcher();
    assert!(dispatcher.on_reactor_thread());
    assert_eq!(dispatcher.current_thread(), thread::current().id());

    let new_owner = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || {
            dispatcher.set_current_thread();
            assert!(dispatcher.on_reactor_thread());
            thread::current().id()
        })
        .join()
        .unwrap()
    };

    assert!(!dispatcher.on_reactor_thread(), "ownership moved away");
    assert_eq!(dispatcher.current_thread(), new_owner);

    dispatcher.set_current_thread();
    assert!(dispatcher.on_reactor_thread());
}

#[test]
fn test_shutdown_before_run_loop_returns() {
    let dispatcher = local_dispatcher();

    dispatcher.shutdown();
    dispatcher.run_loop().unwrap();
}

#[test]
fn test_run_loop_off_thread_panics() {
    let dispatcher = local_dispatcher();

    let result = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || dispatcher.run_loop()).join()
    };

    assert!(result.is_err());
}

#[test]
fn test_shutdown_stops_loop_thread() {
    let lp = spawn_loop();

    assert_eq!(lp.dispatcher.run_sync(|| 5), 5);

    let result = lp.join();
    assert!(matches!(result, Ok(Ok(()))), "loop exits cleanly");
}

#[test]
fn test_destroy_after_loop_thread_joined() {
    let lp = spawn_loop();
    let dispatcher = lp.dispatcher.clone();

    assert!(matches!(lp.join(), Ok(Ok(()))));

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    dispatcher.run_later(move || flag.store(true, Ordering::SeqCst));

    assert!(!dispatcher.on_reactor_thread());
    dispatcher.destroy();

    assert_eq!(dispatcher.pending_commands(), 0);
    assert!(!ran.load(Ordering::SeqCst));
}

/// Flags through a borrow when it is dropped.
struct BorrowedFlag<'a>(&'a AtomicBool);

impl Drop for BorrowedFlag<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_discarded_run_sync_releases_borrows_before_returning() {
    let dispatcher = local_dispatcher();

    let caller = {
        let dispatcher = dispatcher.clone();
        thread::spawn(move || {
            let released = AtomicBool::new(false);
            let mut local = vec![1, 2, 3];

            let guard = BorrowedFlag(&released);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                dispatcher.run_sync(|| {
                    let _guard = guard;
                    local.push(4);
                })
            }));

            // Both borrows are gone by the time the caller resumes.
            let released = released.load(Ordering::SeqCst);
            local.push(5);

            (outcome.is_err(), released, local)
        })
    };

    let deadline = Instant::now() + Duration::from_secs(2);
    while dispatcher.pending_commands() == 0 {
        assert!(Instant::now() < deadline, "command never queued");
        thread::sleep(Duration::from_millis(1));
    }

    dispatcher.destroy();

    let (woken, released, local) = caller.join().unwrap();
    assert!(woken, "blocked caller is woken with a panic");
    assert!(released, "captured state dropped before the caller resumed");
    assert_eq!(local, vec![1, 2, 3, 5], "discarded closure never ran");
}
