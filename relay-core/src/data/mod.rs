//! Market data records carried by TICK and BAR events

pub mod types;

pub use types::{BarData, TickData};
