//! Relay Orders - Order Lifecycle on top of the Dispatch Engine
//!
//! Turns trade intents into order requests and reconciles the asynchronous
//! EXECUTION / ORDER_STATUS feedback that comes back through the engine.
//!
//! ## Flow
//!
//! ```text
//! order(...) ─► adapter ─► ORDER ─► on_order ─► gateway
//!                                                  │
//!         on_order_status ◄─ ORDER_STATUS ◄────────┤
//!         on_execution    ◄─ EXECUTION    ◄────────┘
//! ```
//!
//! ## Modules
//! - `state_machine`: [`OrderStateMachine`], the handler set and order API
//! - `proxy`: live order views and the insertion-ordered open-order map
//! - `style`: Market / Limit / Stop / StopLimit
//! - `sizing`: value and percent to share conversion
//! - `environment` / `adapter`: collaborators the state machine asks for
//!   prices, positions and request construction
//! - `persistence`: DAO contract, in-memory store and JSON-lines journal
//! - `gateway`: simulated gateway with commission and slippage models

pub mod adapter;
pub mod environment;
pub mod error;
pub mod gateway;
pub mod persistence;
pub mod proxy;
pub mod sizing;
pub mod state_machine;
pub mod style;

pub use adapter::{DefaultAdapter, OrderAdapter};
pub use environment::{BacktestEnvironment, Environment, Security, SecurityRef};
pub use error::{GatewayError, OrderError, PersistenceError};
pub use gateway::SimulatedGateway;
pub use persistence::{
    read_journal, replay_journal, Dao, JournalingPersistence, MemoryPersistence, Persistence,
};
pub use proxy::{OpenOrders, OrderProxy};
pub use state_machine::{CancelTarget, OrderStateMachine, Submission};
pub use style::OrderStyle;
