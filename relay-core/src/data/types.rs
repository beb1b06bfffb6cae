use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Top-of-book quote update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickData {
    pub symbol: String,
    pub time: SystemTime,
    pub ask: Decimal,
    pub bid: Decimal,
    /// Last traded price, when the feed carries one
    #[serde(default)]
    pub last: Option<Decimal>,
}

impl TickData {
    pub fn new(symbol: impl Into<String>, time: SystemTime, bid: Decimal, ask: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            time,
            ask,
            bid,
            last: None,
        }
    }

    /// Reference price: last trade if known, otherwise the mid
    pub fn reference_price(&self) -> Decimal {
        self.last.unwrap_or((self.bid + self.ask) / Decimal::TWO)
    }
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarData {
    pub symbol: String,
    pub time: SystemTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}
