//! Engine lifecycle: start/stop/join, both shutdown modes, loop context
//!
//! These tests verify:
//! 1. EXIT drains everything queued ahead of it
//! 2. stop() abandons pending events, leaves them queued and waits for the
//!    in-flight handler whoever else is waiting
//! 3. start/stop are idempotent and the engine restarts cleanly
//! 4. The loop context is entered and exited around every run
//! 5. Concurrent producers lose nothing

use relay_core::core::Side;
use relay_core::engine::{DispatchEngine, FnHandler, LoopContext, Scratch};
use relay_core::event::{Event, EventKind, ALL_TOPICS};
use relay_core::testing::{
    create_test_order, create_test_tick, engine_with_sink, new_log, run_until_exit, wait_until,
    RecordingHandler,
};
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

#[cfg(test)]
mod shutdown {
    use super::*;

    /// Test: 3 TICK + 5 ORDER then EXIT; all eight dispatched, orders first, EXIT last
    #[test]
    fn test_exit_drains_queue() {
        let (engine, sink) = engine_with_sink();
        let log = new_log();
        engine.register(RecordingHandler::shared("order", &log), EventKind::Order, ALL_TOPICS, 0);
        engine.register(RecordingHandler::shared("tick", &log), EventKind::Tick, ALL_TOPICS, 0);
        engine.register(RecordingHandler::shared("exit", &log), EventKind::Exit, ALL_TOPICS, 0);

        for _ in 0..3 {
            engine.put(Event::tick(create_test_tick("A", dec!(10))));
        }
        for _ in 0..5 {
            engine.put(Event::order(create_test_order("A", Side::Buy, 100, dec!(10))));
        }
        engine.start().unwrap();
        engine.put(Event::exit());
        engine.join().unwrap();

        let seen = log.lock().clone();
        assert_eq!(seen.len(), 9);
        assert!(seen[..5].iter().all(|s| s.kind == EventKind::Order));
        assert!(seen[5..8].iter().all(|s| s.kind == EventKind::Tick));
        assert_eq!(seen.last().map(|s| s.kind), Some(EventKind::Exit));
        assert!(!engine.is_running());
        assert_eq!(engine.pending(), 0);
        assert!(sink.is_empty());
    }

    /// Test: hard stop leaves queued events behind
    #[test]
    fn test_stop_abandons_pending() {
        let (engine, _sink) = engine_with_sink();
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);

        engine.register(
            FnHandler::shared("slow", move |_: &Event, _: &mut Scratch| {
                let _ = entered_tx.lock().unwrap().send(());
                thread::sleep(Duration::from_millis(50));
                Ok(())
            }),
            EventKind::Timer,
            ALL_TOPICS,
            0,
        );

        engine.put(Event::timer(SystemTime::now()).with_priority(0));
        for _ in 0..10 {
            engine.put(Event::timer(SystemTime::now()).with_priority(5));
        }

        engine.start().unwrap();
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        engine.stop().unwrap();

        assert!(!engine.is_running());
        assert_eq!(engine.pending(), 10);
        assert_eq!(engine.stats().events_dispatched, 1);
    }

    /// Test: stop() waits for the in-flight handler even while another thread joins
    #[test]
    fn test_stop_waits_while_another_thread_joins() {
        let (engine, _sink) = engine_with_sink();
        let engine = Arc::new(engine);
        let finished = Arc::new(AtomicUsize::new(0));
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);

        let done = Arc::clone(&finished);
        engine.register(
            FnHandler::shared("slow", move |_: &Event, _: &mut Scratch| {
                let _ = entered_tx.lock().unwrap().send(());
                thread::sleep(Duration::from_millis(300));
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            EventKind::Timer,
            ALL_TOPICS,
            0,
        );

        engine.put(Event::timer(SystemTime::now()));
        engine.start().unwrap();
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let joiner = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.join())
        };
        // Let the joiner take the worker handle first
        thread::sleep(Duration::from_millis(50));

        engine.stop().unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(!engine.is_running());

        joiner.join().unwrap().unwrap();
    }

    /// Test: two threads stopping at once both return after the loop is gone
    #[test]
    fn test_concurrent_stops_both_wait() {
        let (engine, _sink) = engine_with_sink();
        let engine = Arc::new(engine);
        let finished = Arc::new(AtomicUsize::new(0));
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);

        let done = Arc::clone(&finished);
        engine.register(
            FnHandler::shared("slow", move |_: &Event, _: &mut Scratch| {
                let _ = entered_tx.lock().unwrap().send(());
                thread::sleep(Duration::from_millis(200));
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            EventKind::Timer,
            ALL_TOPICS,
            0,
        );

        engine.put(Event::timer(SystemTime::now()));
        engine.start().unwrap();
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let stoppers: Vec<_> = (0..2)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let finished = Arc::clone(&finished);
                thread::spawn(move || {
                    engine.stop().unwrap();
                    finished.load(Ordering::SeqCst)
                })
            })
            .collect();

        for stopper in stoppers {
            assert_eq!(stopper.join().unwrap(), 1);
        }
    }

    /// Test: join without a running loop returns immediately
    #[test]
    fn test_join_when_stopped() {
        let engine = DispatchEngine::new();
        engine.join().unwrap();
        engine.stop().unwrap();
        assert!(!engine.is_running());
    }
}

#[cfg(test)]
mod restart {
    use super::*;

    /// Test: start twice spawns one loop; stop twice is harmless
    #[test]
    fn test_idempotent_start_stop() {
        let (engine, _sink) = engine_with_sink();
        let threads = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&threads);
        engine.register(
            FnHandler::shared("thread-recorder", move |_: &Event, _: &mut Scratch| {
                seen.lock().unwrap().push(thread::current().id());
                Ok(())
            }),
            EventKind::Timer,
            ALL_TOPICS,
            0,
        );

        engine.start().unwrap();
        engine.start().unwrap();
        for _ in 0..10 {
            engine.put(Event::timer(SystemTime::now()));
        }
        assert!(wait_until(|| threads.lock().unwrap().len() == 10));

        let ids = threads.lock().unwrap().clone();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_ne!(ids[0], thread::current().id());

        engine.stop().unwrap();
        engine.stop().unwrap();
        assert!(!engine.is_running());
    }

    /// Test: events queued while stopped are dispatched after a restart
    #[test]
    fn test_restart_resumes_pending() {
        let (engine, _sink) = engine_with_sink();
        let log = new_log();
        engine.register(RecordingHandler::shared("timer", &log), EventKind::Timer, ALL_TOPICS, 0);

        run_until_exit(&engine);
        engine.put(Event::timer(SystemTime::now()));
        engine.put(Event::timer(SystemTime::now()));
        assert_eq!(engine.pending(), 2);

        run_until_exit(&engine);
        assert_eq!(log.lock().len(), 2);
    }
}

#[cfg(test)]
mod context {
    use super::*;

    struct Session {
        entered: Arc<AtomicUsize>,
        exited: Arc<AtomicUsize>,
    }

    impl LoopContext for Session {
        fn enter(&mut self) -> anyhow::Result<()> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn exit(&mut self) {
            self.exited.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Unavailable;

    impl LoopContext for Unavailable {
        fn enter(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("database offline")
        }

        fn exit(&mut self) {}
    }

    /// Test: every run enters and exits the context once
    #[test]
    fn test_context_scoped_to_each_run() {
        let engine = DispatchEngine::new();
        let entered = Arc::new(AtomicUsize::new(0));
        let exited = Arc::new(AtomicUsize::new(0));
        engine.set_context(Box::new(Session {
            entered: Arc::clone(&entered),
            exited: Arc::clone(&exited),
        }));

        run_until_exit(&engine);
        assert_eq!(entered.load(Ordering::SeqCst), 1);
        assert_eq!(exited.load(Ordering::SeqCst), 1);

        engine.start().unwrap();
        assert!(wait_until(|| entered.load(Ordering::SeqCst) == 2));
        engine.stop().unwrap();
        assert_eq!(exited.load(Ordering::SeqCst), 2);
    }

    /// Test: a context that cannot be entered keeps the loop from running
    #[test]
    fn test_failed_context_stops_loop() {
        let engine = DispatchEngine::new();
        engine.set_context(Box::new(Unavailable));
        engine.put(Event::timer(SystemTime::now()));

        engine.start().unwrap();
        engine.join().unwrap();

        assert!(!engine.is_running());
        assert_eq!(engine.pending(), 1);
    }
}

#[cfg(test)]
mod producers {
    use super::*;

    /// Test: four producer threads through cloned senders, nothing lost
    #[test]
    fn test_concurrent_producers() {
        let (engine, sink) = engine_with_sink();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        engine.register(
            FnHandler::shared("counter", move |_: &Event, _: &mut Scratch| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            EventKind::Tick,
            ALL_TOPICS,
            0,
        );

        engine.start().unwrap();
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let sender = engine.sender();
                thread::spawn(move || {
                    for _ in 0..100 {
                        sender.put(Event::tick(create_test_tick("A", dec!(10))));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        engine.put(Event::exit());
        engine.join().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 400);
        assert_eq!(engine.stats().events_enqueued, 401);
        assert!(sink.is_empty());
    }
}
