//! Event dispatch engine
//!
//! - `queue`: priority queue with FIFO tie-break
//! - `registry`: `(kind, topic)` handler chains
//! - `handler`: the `Handler` trait and per-dispatch `Scratch`
//! - `context`: resource scoped to the consumer thread
//! - `dispatcher`: `DispatchEngine`, the consumer loop and failure reporting

pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod queue;
pub mod registry;

mod queue_proptest;

pub use context::LoopContext;
pub use dispatcher::{DispatchEngine, DispatchStats, EventSender, FailureSink, TracingFailureSink};
pub use handler::{FnHandler, Handler, HandlerId, Scratch};
pub use queue::EventQueue;
pub use registry::{HandlerChain, HandlerRegistry};
