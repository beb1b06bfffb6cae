//! Relay Core - Event Dispatch Engine for Algorithmic Trading
//!
//! Producers (market data feeds, strategies, gateways) emit typed events; a
//! single consumer thread pulls them from a priority queue and runs the
//! handler chain registered for each event's kind and topic.
//!
//! ## Architecture
//! - **Priority queue**: lower priority value first, FIFO within a priority
//! - **Handler chains**: keyed by `(EventKind, topic)`; the `"."` topic sees all traffic
//! - **Failure isolation**: a failing or panicking handler ends its chain for
//!   that event only and is reported to a `FailureSink`
//! - **Two shutdowns**: EXIT drains the queue, `stop()` abandons it
//!
//! ## Core Modules
//! - `core`: order vocabulary (`Side`, `OrderStatus`, `GlobalOrderId`) and errors
//! - `event`: `Event`, `EventKind`, payloads and priorities
//! - `data`: tick and bar records
//! - `execution`: order, status, execution and cancel records
//! - `engine`: queue, registry, handlers and `DispatchEngine`
//! - `config`: JSON configuration with validation
//! - `utils`: logging setup
//! - `testing` (feature `testing`): recording handlers, fault injection and builders for tests

pub mod config;
pub mod core;
pub mod data;
pub mod engine;
pub mod event;
pub mod execution;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::core::{
    ClOrdId, DispatchFailure, EngineError, FailureCause, GlobalOrderId, OrderAction, OrderStatus,
    OrderType, Side,
};
pub use config::Config;
pub use data::{BarData, TickData};
pub use engine::{
    DispatchEngine, DispatchStats, EventSender, FailureSink, FnHandler, Handler, HandlerId,
    LoopContext, Scratch,
};
pub use event::{Event, EventKind, Payload, ALL_TOPICS};
pub use execution::{CancelReq, ExecutionData, OrderReq, OrderStatusData};

// Re-export error types
pub use anyhow::{Error, Result};
