//! Order styles: how an intent becomes an order type and prices

use relay_core::OrderType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order style, each with an optional exchange override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStyle {
    Market {
        exchange: Option<String>,
    },
    Limit {
        limit_price: Decimal,
        exchange: Option<String>,
    },
    Stop {
        stop_price: Decimal,
        exchange: Option<String>,
    },
    StopLimit {
        limit_price: Decimal,
        stop_price: Decimal,
        exchange: Option<String>,
    },
}

impl OrderStyle {
    pub fn market() -> Self {
        OrderStyle::Market { exchange: None }
    }

    pub fn limit(limit_price: Decimal) -> Self {
        OrderStyle::Limit {
            limit_price,
            exchange: None,
        }
    }

    pub fn stop(stop_price: Decimal) -> Self {
        OrderStyle::Stop {
            stop_price,
            exchange: None,
        }
    }

    pub fn stop_limit(limit_price: Decimal, stop_price: Decimal) -> Self {
        OrderStyle::StopLimit {
            limit_price,
            stop_price,
            exchange: None,
        }
    }

    /// Infer a style from bare price arguments
    ///
    /// Both prices give stop-limit, one gives limit or stop, none gives market.
    pub fn from_prices(limit_price: Option<Decimal>, stop_price: Option<Decimal>) -> Self {
        match (limit_price, stop_price) {
            (Some(limit), Some(stop)) => Self::stop_limit(limit, stop),
            (Some(limit), None) => Self::limit(limit),
            (None, Some(stop)) => Self::stop(stop),
            (None, None) => Self::market(),
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        let value = Some(exchange.into());
        match &mut self {
            OrderStyle::Market { exchange }
            | OrderStyle::Limit { exchange, .. }
            | OrderStyle::Stop { exchange, .. }
            | OrderStyle::StopLimit { exchange, .. } => *exchange = value,
        }
        self
    }

    pub fn exchange(&self) -> Option<&str> {
        match self {
            OrderStyle::Market { exchange }
            | OrderStyle::Limit { exchange, .. }
            | OrderStyle::Stop { exchange, .. }
            | OrderStyle::StopLimit { exchange, .. } => exchange.as_deref(),
        }
    }

    pub fn order_type(&self) -> OrderType {
        match self {
            OrderStyle::Market { .. } => OrderType::Market,
            OrderStyle::Limit { .. } => OrderType::Limit,
            OrderStyle::Stop { .. } => OrderType::Stop,
            OrderStyle::StopLimit { .. } => OrderType::StopLimit,
        }
    }

    /// Limit price, zero when the style has none
    pub fn limit_price(&self) -> Decimal {
        match self {
            OrderStyle::Limit { limit_price, .. } | OrderStyle::StopLimit { limit_price, .. } => {
                *limit_price
            }
            _ => Decimal::ZERO,
        }
    }

    pub fn stop_price(&self) -> Option<Decimal> {
        match self {
            OrderStyle::Stop { stop_price, .. } | OrderStyle::StopLimit { stop_price, .. } => {
                Some(*stop_price)
            }
            _ => None,
        }
    }
}

impl Default for OrderStyle {
    fn default() -> Self {
        Self::market()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_prices() {
        assert_eq!(OrderStyle::from_prices(None, None), OrderStyle::market());
        assert_eq!(
            OrderStyle::from_prices(Some(dec!(10)), None),
            OrderStyle::limit(dec!(10))
        );
        assert_eq!(
            OrderStyle::from_prices(None, Some(dec!(9))),
            OrderStyle::stop(dec!(9))
        );
        assert_eq!(
            OrderStyle::from_prices(Some(dec!(10)), Some(dec!(9))),
            OrderStyle::stop_limit(dec!(10), dec!(9))
        );
    }

    #[test]
    fn test_prices_and_types() {
        let style = OrderStyle::stop_limit(dec!(10.5), dec!(10));
        assert_eq!(style.order_type(), OrderType::StopLimit);
        assert_eq!(style.limit_price(), dec!(10.5));
        assert_eq!(style.stop_price(), Some(dec!(10)));

        let style = OrderStyle::stop(dec!(8));
        assert_eq!(style.limit_price(), Decimal::ZERO);

        assert_eq!(OrderStyle::default().order_type(), OrderType::Market);
    }

    #[test]
    fn test_exchange_override() {
        let style = OrderStyle::limit(dec!(1)).with_exchange("SSE");
        assert_eq!(style.exchange(), Some("SSE"));
        assert_eq!(OrderStyle::market().exchange(), None);
    }
}
