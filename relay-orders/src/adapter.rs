//! Turns `(security, signed amount, style)` into a concrete `OrderReq`

use crate::environment::Security;
use crate::error::OrderError;
use crate::style::OrderStyle;
use relay_core::config::OrdersConfig;
use relay_core::{OrderAction, OrderReq, Side};
use std::time::SystemTime;

pub trait OrderAdapter: Send + Sync {
    /// Build a request without a client id; `amount` is signed (negative sells)
    fn parse(
        &self,
        security: &Security,
        amount: i64,
        style: &OrderStyle,
        transact_time: SystemTime,
    ) -> Result<OrderReq, OrderError>;
}

/// Maps sign to side, magnitude to quantity and style to type and prices
///
/// Buys open and sells close; shorting needs a custom adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAdapter {
    gateway: String,
    account: String,
}

impl DefaultAdapter {
    pub fn new(gateway: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            account: account.into(),
        }
    }

    pub fn from_config(config: &OrdersConfig) -> Self {
        Self::new(&config.gateway, &config.account)
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

impl OrderAdapter for DefaultAdapter {
    fn parse(
        &self,
        security: &Security,
        amount: i64,
        style: &OrderStyle,
        transact_time: SystemTime,
    ) -> Result<OrderReq, OrderError> {
        if amount == 0 {
            return Err(OrderError::Adapter(format!(
                "zero amount for {}",
                security.symbol
            )));
        }

        let side = Side::from_amount(amount);
        let action = match side {
            Side::Buy => OrderAction::Open,
            Side::Sell => OrderAction::Close,
        };

        Ok(OrderReq {
            cl_ord_id: None,
            gateway: self.gateway.clone(),
            account: self.account.clone(),
            symbol: security.symbol.clone(),
            exchange: style
                .exchange()
                .unwrap_or(security.exchange.as_str())
                .to_string(),
            side,
            action,
            order_type: style.order_type(),
            price: style.limit_price(),
            stop_price: style.stop_price(),
            order_qty: amount.unsigned_abs(),
            transact_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::OrderType;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_buy() {
        let adapter = DefaultAdapter::new("sim", "acc");
        let req = adapter
            .parse(&Security::new("000001", "SZ"), 300, &OrderStyle::market(), SystemTime::UNIX_EPOCH)
            .unwrap();

        assert_eq!(req.side, Side::Buy);
        assert_eq!(req.action, OrderAction::Open);
        assert_eq!(req.order_type, OrderType::Market);
        assert_eq!(req.price, Decimal::ZERO);
        assert_eq!(req.order_qty, 300);
        assert_eq!(req.exchange, "SZ");
        assert!(req.cl_ord_id.is_none());
    }

    #[test]
    fn test_limit_sell_with_exchange_override() {
        let adapter = DefaultAdapter::new("sim", "acc");
        let style = OrderStyle::limit(dec!(10.5)).with_exchange("XSHE");
        let req = adapter
            .parse(&Security::new("000001", "SZ"), -200, &style, SystemTime::UNIX_EPOCH)
            .unwrap();

        assert_eq!(req.side, Side::Sell);
        assert_eq!(req.action, OrderAction::Close);
        assert_eq!(req.price, dec!(10.5));
        assert_eq!(req.order_qty, 200);
        assert_eq!(req.exchange, "XSHE");
    }

    #[test]
    fn test_zero_amount_rejected() {
        let adapter = DefaultAdapter::new("sim", "acc");
        let result = adapter.parse(&Security::new("A", "X"), 0, &OrderStyle::market(), SystemTime::UNIX_EPOCH);
        assert!(matches!(result, Err(OrderError::Adapter(_))));
    }

    #[test]
    fn test_from_config() {
        let adapter = DefaultAdapter::from_config(&OrdersConfig::default());
        assert_eq!(adapter.gateway(), "sim");
        assert_eq!(adapter.account(), "default");
    }
}
