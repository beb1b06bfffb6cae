//! Trading environment seen by the order state machine
//!
//! The state machine asks the environment for security metadata, the clock,
//! positions, portfolio value and prices. [`BacktestEnvironment`] is an
//! in-memory implementation that can follow the event stream itself.

use anyhow::Result;
use parking_lot::RwLock;
use relay_core::engine::{Handler, Scratch};
use relay_core::{Event, Payload, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Tradable instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Security {
    pub symbol: String,
    pub exchange: String,
    /// Currency value of one price point per share (1 for cash equities)
    pub point_value: Decimal,
}

impl Security {
    pub fn new(symbol: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            point_value: Decimal::ONE,
        }
    }

    pub fn with_point_value(mut self, point_value: Decimal) -> Self {
        self.point_value = point_value;
        self
    }
}

/// A security given either by ticker or already resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityRef {
    Ticker(String),
    Resolved(Security),
}

impl From<&str> for SecurityRef {
    fn from(ticker: &str) -> Self {
        SecurityRef::Ticker(ticker.to_string())
    }
}

impl From<String> for SecurityRef {
    fn from(ticker: String) -> Self {
        SecurityRef::Ticker(ticker)
    }
}

impl From<Security> for SecurityRef {
    fn from(security: Security) -> Self {
        SecurityRef::Resolved(security)
    }
}

impl From<&Security> for SecurityRef {
    fn from(security: &Security) -> Self {
        SecurityRef::Resolved(security.clone())
    }
}

pub trait Environment: Send + Sync {
    /// Resolve a ticker; `None` if unknown
    fn symbol(&self, ticker: &str) -> Option<Security>;

    fn current_time(&self) -> SystemTime;

    /// Signed position in shares (negative when short)
    fn position_volume(&self, symbol: &str) -> i64;

    fn portfolio_value(&self) -> Decimal;

    fn current_price(&self, symbol: &str) -> Option<Decimal>;
}

/// In-memory environment driven by setters or by the event stream
///
/// Registered as a handler it follows TICK/BAR prices, TIMER time and
/// EXECUTION fills. Cash and valuation are not modelled: the portfolio value
/// is whatever was last set.
pub struct BacktestEnvironment {
    securities: RwLock<HashMap<String, Security>>,
    positions: RwLock<HashMap<String, i64>>,
    prices: RwLock<HashMap<String, Decimal>>,
    clock: RwLock<Option<SystemTime>>,
    portfolio_value: RwLock<Decimal>,
}

impl BacktestEnvironment {
    pub fn new() -> Self {
        Self {
            securities: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
            prices: RwLock::new(HashMap::new()),
            clock: RwLock::new(None),
            portfolio_value: RwLock::new(Decimal::ZERO),
        }
    }

    pub fn add_security(&self, security: Security) {
        self.securities
            .write()
            .insert(security.symbol.clone(), security);
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().insert(symbol.to_string(), price);
    }

    pub fn set_position(&self, symbol: &str, volume: i64) {
        self.positions.write().insert(symbol.to_string(), volume);
    }

    pub fn set_portfolio_value(&self, value: Decimal) {
        *self.portfolio_value.write() = value;
    }

    /// Pin the clock; until set, `current_time` is wall-clock time
    pub fn set_time(&self, time: SystemTime) {
        *self.clock.write() = Some(time);
    }

    /// Apply one event to prices, clock or positions
    pub fn observe(&self, event: &Event) {
        match event.payload() {
            Payload::Tick(tick) => {
                self.set_price(&tick.symbol, tick.reference_price());
                self.set_time(tick.time);
            }
            Payload::Bar(bar) => {
                self.set_price(&bar.symbol, bar.close);
                self.set_time(bar.time);
            }
            Payload::Timer(timer) => self.set_time(timer.time),
            Payload::Execution(exec) => {
                let signed = i64::try_from(exec.last_qty).unwrap_or(i64::MAX);
                let delta = match exec.side {
                    Side::Buy => signed,
                    Side::Sell => -signed,
                };
                *self
                    .positions
                    .write()
                    .entry(exec.symbol.clone())
                    .or_insert(0) += delta;
            }
            _ => {}
        }
    }
}

impl Default for BacktestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for BacktestEnvironment {
    fn symbol(&self, ticker: &str) -> Option<Security> {
        self.securities.read().get(ticker).cloned()
    }

    fn current_time(&self) -> SystemTime {
        self.clock.read().unwrap_or_else(SystemTime::now)
    }

    fn position_volume(&self, symbol: &str) -> i64 {
        self.positions.read().get(symbol).copied().unwrap_or(0)
    }

    fn portfolio_value(&self) -> Decimal {
        *self.portfolio_value.read()
    }

    fn current_price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.read().get(symbol).copied()
    }
}

impl Handler for BacktestEnvironment {
    fn name(&self) -> &str {
        "backtest_environment"
    }

    fn handle(&self, event: &Event, _scratch: &mut Scratch) -> Result<()> {
        self.observe(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::testing::create_test_tick;
    use relay_core::{ExecutionData, GlobalOrderId, OrderAction};
    use rust_decimal_macros::dec;

    fn execution(side: Side, qty: u64) -> ExecutionData {
        ExecutionData {
            exec_id: "e1".to_string(),
            g_cl_ord_id: GlobalOrderId::new("sim", "a", 1),
            cl_ord_id: 1,
            time: SystemTime::UNIX_EPOCH,
            symbol: "000001".to_string(),
            exchange: "SZ".to_string(),
            side,
            action: OrderAction::Open,
            last_qty: qty,
            last_px: dec!(10),
            commission: dec!(0),
            gateway: "sim".to_string(),
            account: "a".to_string(),
        }
    }

    #[test]
    fn test_symbol_lookup() {
        let env = BacktestEnvironment::new();
        env.add_security(Security::new("000001", "SZ"));
        assert_eq!(env.symbol("000001").unwrap().exchange, "SZ");
        assert!(env.symbol("600000").is_none());
    }

    #[test]
    fn test_observe_prices_and_fills() {
        let env = BacktestEnvironment::new();
        env.observe(&Event::tick(create_test_tick("000001", dec!(15))));
        assert_eq!(env.current_price("000001"), Some(dec!(15)));

        env.observe(&Event::execution(execution(Side::Buy, 300)));
        env.observe(&Event::execution(execution(Side::Sell, 100)));
        assert_eq!(env.position_volume("000001"), 200);
        assert_eq!(env.position_volume("600000"), 0);
    }

    #[test]
    fn test_clock() {
        let env = BacktestEnvironment::new();
        env.observe(&Event::timer(SystemTime::UNIX_EPOCH));
        assert_eq!(env.current_time(), SystemTime::UNIX_EPOCH);
    }
}
