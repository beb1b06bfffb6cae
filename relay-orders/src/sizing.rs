//! Value and percent sizing
//!
//! `shares = trunc(value / price / point_value)`; truncation is toward zero so
//! negative values (sells) round the same way as positive ones.

use crate::environment::Security;
use crate::error::OrderError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Convert a currency value into a signed share count
pub fn value_to_shares(security: &Security, value: Decimal, price: Decimal) -> Result<i64, OrderError> {
    if price <= Decimal::ZERO {
        return Err(OrderError::PriceUnavailable(security.symbol.clone()));
    }
    if security.point_value <= Decimal::ZERO {
        return Err(OrderError::InvalidPointValue(security.symbol.clone()));
    }

    value
        .checked_div(price)
        .and_then(|per_price| per_price.checked_div(security.point_value))
        .and_then(|shares| shares.trunc().to_i64())
        .ok_or_else(|| OrderError::SizeOverflow(security.symbol.clone()))
}

/// Value of `percent` of the portfolio (0.5 means half)
pub fn percent_to_value(portfolio_value: Decimal, percent: Decimal) -> Result<Decimal, OrderError> {
    portfolio_value
        .checked_mul(percent)
        .ok_or_else(|| OrderError::SizeOverflow("portfolio".to_string()))
}
