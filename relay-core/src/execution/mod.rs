//! Order, status, execution and cancellation records
//!
//! These travel as ORDER, ORDER_STATUS, EXECUTION and CANCEL event payloads
//! and are what the persistence DAOs store.

pub mod types;

pub use types::{CancelReq, ExecutionData, OrderReq, OrderStatusData};
