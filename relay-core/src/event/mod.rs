//! Typed events flowing through the dispatch engine
//!
//! An [`Event`] is an immutable value: its kind is derived from the payload and
//! its priority is fixed when it is built. Lower priority values dispatch first.

use crate::data::{BarData, TickData};
use crate::execution::{CancelReq, ExecutionData, OrderReq, OrderStatusData};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Topic that every registration on a kind also receives
pub const ALL_TOPICS: &str = ".";

/// Priority of trade-critical events (ORDER, CANCEL, EXECUTION, ORDER_STATUS)
pub const PRIORITY_TRADE: i32 = 0;
/// Priority of market data and clock events (TICK, BAR, TIMER)
pub const PRIORITY_MARKET: i32 = 1;
/// Priority of the EXIT event, dispatched after everything else
pub const PRIORITY_EXIT: i32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Tick,
    Bar,
    Order,
    Execution,
    OrderStatus,
    Cancel,
    Timer,
    Exit,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Tick,
        EventKind::Bar,
        EventKind::Order,
        EventKind::Execution,
        EventKind::OrderStatus,
        EventKind::Cancel,
        EventKind::Timer,
        EventKind::Exit,
    ];

    /// Priority an event of this kind gets unless overridden
    pub const fn default_priority(self) -> i32 {
        match self {
            EventKind::Order
            | EventKind::Cancel
            | EventKind::Execution
            | EventKind::OrderStatus => PRIORITY_TRADE,
            EventKind::Tick | EventKind::Bar | EventKind::Timer => PRIORITY_MARKET,
            EventKind::Exit => PRIORITY_EXIT,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Tick => "TICK",
            EventKind::Bar => "BAR",
            EventKind::Order => "ORDER",
            EventKind::Execution => "EXECUTION",
            EventKind::OrderStatus => "ORDER_STATUS",
            EventKind::Cancel => "CANCEL",
            EventKind::Timer => "TIMER",
            EventKind::Exit => "EXIT",
        };
        f.write_str(s)
    }
}

/// Clock advance produced by backtest drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerData {
    pub time: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Tick(TickData),
    Bar(BarData),
    Order(OrderReq),
    Execution(ExecutionData),
    OrderStatus(OrderStatusData),
    Cancel(CancelReq),
    Timer(TimerData),
    Exit,
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::Tick(_) => EventKind::Tick,
            Payload::Bar(_) => EventKind::Bar,
            Payload::Order(_) => EventKind::Order,
            Payload::Execution(_) => EventKind::Execution,
            Payload::OrderStatus(_) => EventKind::OrderStatus,
            Payload::Cancel(_) => EventKind::Cancel,
            Payload::Timer(_) => EventKind::Timer,
            Payload::Exit => EventKind::Exit,
        }
    }
}

/// A dispatchable message
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    topic: String,
    priority: i32,
    payload: Payload,
}

impl Event {
    /// Build an event on the all-traffic topic with its kind's default priority
    pub fn new(payload: Payload) -> Self {
        let kind = payload.kind();
        Self {
            kind,
            topic: ALL_TOPICS.to_string(),
            priority: kind.default_priority(),
            payload,
        }
    }

    pub fn tick(tick: TickData) -> Self {
        Self::new(Payload::Tick(tick))
    }

    pub fn bar(bar: BarData) -> Self {
        Self::new(Payload::Bar(bar))
    }

    pub fn order(req: OrderReq) -> Self {
        Self::new(Payload::Order(req))
    }

    pub fn execution(exec: ExecutionData) -> Self {
        Self::new(Payload::Execution(exec))
    }

    pub fn order_status(status: OrderStatusData) -> Self {
        Self::new(Payload::OrderStatus(status))
    }

    pub fn cancel(req: CancelReq) -> Self {
        Self::new(Payload::Cancel(req))
    }

    pub fn timer(time: SystemTime) -> Self {
        Self::new(Payload::Timer(TimerData { time }))
    }

    pub fn exit() -> Self {
        Self::new(Payload::Exit)
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Override the dispatch priority; only possible before the event is enqueued
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[inline]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[inline]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn as_tick(&self) -> Option<&TickData> {
        match &self.payload {
            Payload::Tick(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_bar(&self) -> Option<&BarData> {
        match &self.payload {
            Payload::Bar(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_order(&self) -> Option<&OrderReq> {
        match &self.payload {
            Payload::Order(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_execution(&self) -> Option<&ExecutionData> {
        match &self.payload {
            Payload::Execution(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_order_status(&self) -> Option<&OrderStatusData> {
        match &self.payload {
            Payload::OrderStatus(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_cancel(&self) -> Option<&CancelReq> {
        match &self.payload {
            Payload::Cancel(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_timer(&self) -> Option<&TimerData> {
        match &self.payload {
            Payload::Timer(t) => Some(t),
            _ => None,
        }
    }
}
