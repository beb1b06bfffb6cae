//! Dispatch engine: priority queue plus a single consumer thread
//!
//! ```text
//! producers ──put──▶ EventQueue ──try_pop──▶ loop ──chain_for──▶ HandlerRegistry
//!                   (priority, seq)           │
//!                                             └─▶ handler₁ → handler₂ → …  (one Scratch per event)
//! ```
//!
//! Shutdown comes in two flavours. An EXIT event (priority 999) is dispatched
//! after everything queued before it, and the built-in EXIT handler clears the
//! running flag: this drains the queue. `stop()` clears the flag directly and
//! abandons whatever is still queued.

use super::context::{ContextGuard, LoopContext};
use super::handler::{Handler, HandlerId, Scratch};
use super::queue::EventQueue;
use super::registry::{HandlerChain, HandlerRegistry};
use crate::config::EngineConfig;
use crate::core::errors::panic_message;
use crate::core::{DispatchFailure, EngineError, FailureCause};
use crate::event::{Event, EventKind, ALL_TOPICS};
use anyhow::Result;
use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, info, warn};

/// Receives every handler failure
pub trait FailureSink: Send + Sync {
    fn report(&self, failure: DispatchFailure);
}

/// Default sink: one `error!` line per failure
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFailureSink;

impl FailureSink for TracingFailureSink {
    fn report(&self, failure: DispatchFailure) {
        error!(
            handler = %failure.handler,
            kind = %failure.kind,
            topic = %failure.topic,
            "{}",
            failure
        );
    }
}

/// Snapshot of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub events_enqueued: u64,
    pub events_dispatched: u64,
    pub handler_invocations: u64,
    pub handler_failures: u64,
    pub chains_ended_early: u64,
}

#[derive(Default)]
struct DispatchCounters {
    enqueued: AtomicU64,
    dispatched: AtomicU64,
    invocations: AtomicU64,
    failures: AtomicU64,
    ended_early: AtomicU64,
}

impl DispatchCounters {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            events_enqueued: self.enqueued.load(Ordering::Relaxed),
            events_dispatched: self.dispatched.load(Ordering::Relaxed),
            handler_invocations: self.invocations.load(Ordering::Relaxed),
            handler_failures: self.failures.load(Ordering::Relaxed),
            chains_ended_early: self.ended_early.load(Ordering::Relaxed),
        }
    }
}

/// Built-in EXIT handler: lets the loop finish the current dispatch and stop
struct ExitHandler {
    running: Arc<AtomicBool>,
}

impl Handler for ExitHandler {
    fn name(&self) -> &str {
        "exit"
    }

    fn handle(&self, _event: &Event, _scratch: &mut Scratch) -> Result<()> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }
}

struct Shared {
    queue: EventQueue,
    registry: HandlerRegistry,
    running: Arc<AtomicBool>,
    counters: DispatchCounters,
    sink: RwLock<Arc<dyn FailureSink>>,
    context: Mutex<Option<Box<dyn LoopContext>>>,
    loop_thread: Mutex<Option<ThreadId>>,
    /// True from `start()` until the consumer thread has fully wound down
    active: Mutex<bool>,
    finished: Condvar,
    config: EngineConfig,
}

impl Shared {
    fn put(&self, event: Event) {
        let sequence = self.queue.put(event);
        DispatchCounters::bump(&self.counters.enqueued);
        debug!(sequence, "Event enqueued");
    }

    fn on_loop_thread(&self) -> bool {
        *self.loop_thread.lock() == Some(thread::current().id())
    }

    /// Block until no consumer is active; any number of threads may wait
    fn wait_finished(&self) {
        let mut active = self.active.lock();
        while *active {
            self.finished.wait(&mut active);
        }
    }

    fn run_loop(&self) {
        let backoff = Backoff::new();
        let idle = self.config.idle_sleep();

        while self.running.load(Ordering::Acquire) {
            match self.queue.try_pop() {
                Some(event) => {
                    backoff.reset();
                    self.dispatch(&event);
                }
                None => {
                    if backoff.is_completed() {
                        thread::sleep(idle);
                    } else {
                        backoff.snooze();
                    }
                }
            }
        }
    }

    fn dispatch(&self, event: &Event) {
        DispatchCounters::bump(&self.counters.dispatched);
        let chain: HandlerChain = self.registry.chain_for(event.kind(), event.topic());
        debug!(
            kind = %event.kind(),
            topic = event.topic(),
            priority = event.priority(),
            handlers = chain.len(),
            "Dispatching event"
        );

        let mut scratch = Scratch::new();
        for handler in chain.iter() {
            DispatchCounters::bump(&self.counters.invocations);

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event, &mut scratch)));
            let cause = match outcome {
                Ok(Ok(())) => {
                    if scratch.is_ended() {
                        DispatchCounters::bump(&self.counters.ended_early);
                        debug!(handler = handler.name(), "Chain ended early");
                        break;
                    }
                    continue;
                }
                Ok(Err(e)) => FailureCause::Error(format!("{:#}", e)),
                Err(payload) => FailureCause::Panic(panic_message(payload.as_ref())),
            };

            DispatchCounters::bump(&self.counters.failures);
            let failure = DispatchFailure {
                handler: handler.name().to_string(),
                kind: event.kind(),
                topic: event.topic().to_string(),
                cause,
            };
            let sink = Arc::clone(&*self.sink.read());
            sink.report(failure);
            break;
        }
    }
}

/// Clears the running flag however the consumer thread ends
struct RunningReset<'a>(&'a AtomicBool);

impl Drop for RunningReset<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Wakes every `stop()` / `join()` waiter once the consumer is done
struct FinishSignal<'a>(&'a Shared);

impl Drop for FinishSignal<'_> {
    fn drop(&mut self) {
        *self.0.active.lock() = false;
        self.0.finished.notify_all();
    }
}

/// Cloneable handle for producers on other threads
///
/// Holds the engine weakly so handlers can keep a sender without keeping the
/// engine alive. Events put after the engine is dropped are discarded.
#[derive(Clone)]
pub struct EventSender {
    shared: Weak<Shared>,
}

impl EventSender {
    pub fn put(&self, event: Event) {
        match self.shared.upgrade() {
            Some(shared) => shared.put(event),
            None => warn!(kind = %event.kind(), "Engine dropped, event discarded"),
        }
    }

    /// False once the engine has been dropped
    pub fn is_connected(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("connected", &self.is_connected())
            .finish()
    }
}

pub struct DispatchEngine {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let running = Arc::new(AtomicBool::new(false));
        let shared = Arc::new(Shared {
            queue: EventQueue::new(),
            registry: HandlerRegistry::new(),
            running: Arc::clone(&running),
            counters: DispatchCounters::default(),
            sink: RwLock::new(Arc::new(TracingFailureSink)),
            context: Mutex::new(None),
            loop_thread: Mutex::new(None),
            active: Mutex::new(false),
            finished: Condvar::new(),
            config,
        });

        // Lowest priority so user EXIT handlers on "." run first
        shared.registry.register(
            Arc::new(ExitHandler { running }),
            EventKind::Exit,
            ALL_TOPICS,
            i32::MIN,
        );

        Self {
            shared,
            worker: Mutex::new(None),
        }
    }

    /// Enqueue an event; callable from any thread
    pub fn put(&self, event: Event) {
        self.shared.put(event);
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn register(
        &self,
        handler: Arc<dyn Handler>,
        kind: EventKind,
        topic: &str,
        priority: i32,
    ) -> HandlerId {
        self.shared.registry.register(handler, kind, topic, priority)
    }

    pub fn unregister(&self, handler: &Arc<dyn Handler>, kind: EventKind, topic: &str) -> usize {
        self.shared.registry.unregister(handler, kind, topic)
    }

    pub fn unregister_id(&self, id: HandlerId) -> bool {
        self.shared.registry.unregister_id(id)
    }

    pub fn topics(&self, kind: EventKind) -> Vec<String> {
        self.shared.registry.topics(kind)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.shared.registry
    }

    /// Install the resource the loop runs inside; entered on the next `start()`
    pub fn set_context(&self, context: Box<dyn LoopContext>) {
        *self.shared.context.lock() = Some(context);
    }

    pub fn set_failure_sink(&self, sink: Arc<dyn FailureSink>) {
        *self.shared.sink.write() = sink;
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Events still queued
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Remove every queued event, in dispatch order
    ///
    /// Meant for inspecting what a hard `stop()` left behind.
    pub fn take_pending(&self) -> Vec<Event> {
        self.shared.queue.drain()
    }

    pub fn stats(&self) -> DispatchStats {
        self.shared.counters.snapshot()
    }

    /// Spawn the consumer thread; a no-op when already running
    ///
    /// From a handler this is only allowed while the loop is still running,
    /// since a restart would have to join the calling thread.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.shared.on_loop_thread() {
            return if self.is_running() {
                Ok(())
            } else {
                Err(EngineError::StartFromLoop)
            };
        }

        let mut worker = self.worker.lock();

        match worker.take() {
            Some(handle) => {
                if self.is_running() && !handle.is_finished() {
                    *worker = Some(handle);
                    return Ok(());
                }
                // Previous loop is winding down
                Self::reap(handle)?;
            }
            None => {
                // Another thread holds the handle in join()
                if self.is_running() && *self.shared.active.lock() {
                    return Ok(());
                }
                self.shared.wait_finished();
            }
        }

        self.shared.running.store(true, Ordering::Release);
        *self.shared.active.lock() = true;
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || Self::consumer(&shared));

        match spawned {
            Ok(handle) => {
                info!(thread = %self.shared.config.thread_name, "Dispatch engine started");
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                *self.shared.active.lock() = false;
                self.shared.finished.notify_all();
                Err(EngineError::Spawn(e))
            }
        }
    }

    /// Hard stop: abandon queued events and wait for the consumer to exit
    ///
    /// Waits even when another thread is already joining. Called from a
    /// handler it only clears the running flag.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.shared.running.store(false, Ordering::Release);
        if self.shared.on_loop_thread() {
            return Ok(());
        }

        let reaped = self.wait_consumer()?;
        if reaped {
            info!(pending = self.pending(), "Dispatch engine stopped");
        }
        Ok(())
    }

    /// Wait for the consumer to finish on its own (after an EXIT event)
    pub fn join(&self) -> Result<(), EngineError> {
        if self.shared.on_loop_thread() {
            return Err(EngineError::JoinFromLoop);
        }
        self.wait_consumer().map(|_| ())
    }

    /// Reap the worker if this caller owns the handle, then wait until the
    /// consumer has signalled completion. Returns true if the handle was ours.
    fn wait_consumer(&self) -> Result<bool, EngineError> {
        let handle = self.worker.lock().take();
        let reaped = match handle {
            Some(handle) => {
                Self::reap(handle)?;
                true
            }
            None => false,
        };
        self.shared.wait_finished();
        Ok(reaped)
    }

    fn reap(handle: JoinHandle<()>) -> Result<(), EngineError> {
        handle
            .join()
            .map_err(|payload| EngineError::WorkerPanicked(panic_message(payload.as_ref())))
    }

    fn consumer(shared: &Shared) {
        let _finished = FinishSignal(shared);
        let _reset = RunningReset(&shared.running);
        *shared.loop_thread.lock() = Some(thread::current().id());

        let guard = match ContextGuard::enter(&shared.context) {
            Ok(guard) => guard,
            Err(e) => {
                error!("Loop context failed to enter: {:#}", e);
                *shared.loop_thread.lock() = None;
                return;
            }
        };

        shared.run_loop();

        drop(guard);
        *shared.loop_thread.lock() = None;
        debug!("Dispatch loop exited");
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DispatchEngine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Dispatch engine did not stop cleanly: {}", e);
        }
    }
}
