//! Test helper utilities for handlers, failure capture and test data
//!
//! Provides:
//! - `RecordingHandler`: appends every event it sees to a shared log
//! - `FailingHandler` / `PanickingHandler`: fault injection
//! - `CollectingSink`: keeps every `DispatchFailure`
//! - Builders for ticks and order requests
//! - `wait_until` / `run_until_exit` for driving the engine thread

use crate::core::{DispatchFailure, OrderAction, OrderType, Side};
use crate::data::TickData;
use crate::engine::{DispatchEngine, FailureSink, Handler, Scratch};
use crate::event::{Event, EventKind};
use crate::execution::OrderReq;
use anyhow::Result;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

/// One entry of a shared dispatch log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub handler: String,
    pub kind: EventKind,
    pub topic: String,
    pub priority: i32,
}

pub type DispatchLog = Arc<Mutex<Vec<Seen>>>;

pub fn new_log() -> DispatchLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records each event into a log shared with other handlers
pub struct RecordingHandler {
    name: String,
    log: DispatchLog,
}

impl RecordingHandler {
    pub fn shared(name: &str, log: &DispatchLog) -> Arc<dyn Handler> {
        Arc::new(Self {
            name: name.to_string(),
            log: Arc::clone(log),
        })
    }
}

impl Handler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &Event, _scratch: &mut Scratch) -> Result<()> {
        self.log.lock().push(Seen {
            handler: self.name.clone(),
            kind: event.kind(),
            topic: event.topic().to_string(),
            priority: event.priority(),
        });
        Ok(())
    }
}

/// Always returns an error
pub struct FailingHandler {
    name: String,
    message: String,
}

impl FailingHandler {
    pub fn shared(name: &str, message: &str) -> Arc<dyn Handler> {
        Arc::new(Self {
            name: name.to_string(),
            message: message.to_string(),
        })
    }
}

impl Handler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, _event: &Event, _scratch: &mut Scratch) -> Result<()> {
        anyhow::bail!("{}", self.message)
    }
}

/// Always panics
pub struct PanickingHandler {
    name: String,
    message: String,
}

impl PanickingHandler {
    pub fn shared(name: &str, message: &str) -> Arc<dyn Handler> {
        Arc::new(Self {
            name: name.to_string(),
            message: message.to_string(),
        })
    }
}

impl Handler for PanickingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, _event: &Event, _scratch: &mut Scratch) -> Result<()> {
        panic!("{}", self.message);
    }
}

/// Failure sink that keeps everything it receives
#[derive(Default)]
pub struct CollectingSink {
    failures: Mutex<Vec<DispatchFailure>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failures(&self) -> Vec<DispatchFailure> {
        self.failures.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.lock().is_empty()
    }
}

impl FailureSink for CollectingSink {
    fn report(&self, failure: DispatchFailure) {
        self.failures.lock().push(failure);
    }
}

/// Engine with a collecting sink already installed
pub fn engine_with_sink() -> (DispatchEngine, Arc<CollectingSink>) {
    let engine = DispatchEngine::new();
    let sink = CollectingSink::new();
    engine.set_failure_sink(Arc::clone(&sink) as Arc<dyn FailureSink>);
    (engine, sink)
}

/// Start the engine, enqueue EXIT and wait for the loop to drain
pub fn run_until_exit(engine: &DispatchEngine) {
    engine.start().expect("engine start");
    engine.put(Event::exit());
    engine.join().expect("engine join");
}

/// Poll `cond` until it holds or five seconds pass
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// Create a test tick for `symbol` with a one-tick spread around `mid`
pub fn create_test_tick(symbol: &str, mid: Decimal) -> TickData {
    let half = Decimal::new(1, 2);
    TickData::new(symbol, SystemTime::now(), mid - half, mid + half)
}

/// Create a limit order request without a client id
pub fn create_test_order(symbol: &str, side: Side, qty: u64, price: Decimal) -> OrderReq {
    OrderReq {
        cl_ord_id: None,
        gateway: "sim".to_string(),
        account: "test".to_string(),
        symbol: symbol.to_string(),
        exchange: "SIM".to_string(),
        side,
        action: match side {
            Side::Buy => OrderAction::Open,
            Side::Sell => OrderAction::Close,
        },
        order_type: OrderType::Limit,
        price,
        stop_price: None,
        order_qty: qty,
        transact_time: SystemTime::now(),
    }
}
