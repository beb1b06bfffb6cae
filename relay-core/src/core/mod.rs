//! Core vocabulary types
//!
//! - `Side`, `OrderAction`, `OrderType`, `OrderStatus`: order attributes
//! - `GlobalOrderId`: `gateway.account.clOrdID` identity
//! - Engine error types (`DispatchFailure`, `EngineError`)

pub mod errors;
pub mod types;

pub use errors::{DispatchFailure, EngineError, FailureCause};
pub use types::{ClOrdId, GlobalOrderId, OrderAction, OrderStatus, OrderType, Side};
