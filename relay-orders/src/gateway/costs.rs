//! Commission and slippage models for simulated fills

use relay_core::config::{CommissionConfig, SlippageConfig};
use relay_core::Side;
use rust_decimal::Decimal;

/// Commission charged on one fill
pub trait CommissionModel: Send + Sync {
    fn commission(&self, qty: u64, price: Decimal) -> Decimal;
}

/// Fill price after slippage, always against the order side
pub trait SlippageModel: Send + Sync {
    fn apply(&self, price: Decimal, side: Side) -> Decimal;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroCommission;

impl CommissionModel for ZeroCommission {
    fn commission(&self, _qty: u64, _price: Decimal) -> Decimal {
        Decimal::ZERO
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PerShareCommission {
    pub rate: Decimal,
}

impl CommissionModel for PerShareCommission {
    fn commission(&self, qty: u64, _price: Decimal) -> Decimal {
        self.rate * Decimal::from(qty)
    }
}

/// Fraction of notional, never below `minimum`
#[derive(Debug, Clone, Copy)]
pub struct PercentCommission {
    pub rate: Decimal,
    pub minimum: Decimal,
}

impl CommissionModel for PercentCommission {
    fn commission(&self, qty: u64, price: Decimal) -> Decimal {
        (price * Decimal::from(qty) * self.rate).max(self.minimum)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroSlippage;

impl SlippageModel for ZeroSlippage {
    fn apply(&self, price: Decimal, _side: Side) -> Decimal {
        price
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedSlippage {
    pub amount: Decimal,
}

impl SlippageModel for FixedSlippage {
    fn apply(&self, price: Decimal, side: Side) -> Decimal {
        match side {
            Side::Buy => price + self.amount,
            Side::Sell => (price - self.amount).max(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PercentSlippage {
    pub rate: Decimal,
}

impl SlippageModel for PercentSlippage {
    fn apply(&self, price: Decimal, side: Side) -> Decimal {
        let factor = Decimal::ONE + self.rate;
        match side {
            Side::Buy => price * factor,  // Pay more
            Side::Sell => price / factor, // Receive less
        }
    }
}

pub fn commission_model(config: &CommissionConfig) -> Box<dyn CommissionModel> {
    match config {
        CommissionConfig::Zero => Box::new(ZeroCommission),
        CommissionConfig::PerShare { rate } => Box::new(PerShareCommission { rate: *rate }),
        CommissionConfig::Percent { rate, minimum } => Box::new(PercentCommission {
            rate: *rate,
            minimum: *minimum,
        }),
    }
}

pub fn slippage_model(config: &SlippageConfig) -> Box<dyn SlippageModel> {
    match config {
        SlippageConfig::Zero => Box::new(ZeroSlippage),
        SlippageConfig::Fixed { amount } => Box::new(FixedSlippage { amount: *amount }),
        SlippageConfig::Percent { rate } => Box::new(PercentSlippage { rate: *rate }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_commission_models() {
        assert_eq!(ZeroCommission.commission(100, dec!(10)), dec!(0));

        let per_share = commission_model(&CommissionConfig::PerShare { rate: dec!(0.01) });
        assert_eq!(per_share.commission(300, dec!(10)), dec!(3));

        let percent = commission_model(&CommissionConfig::Percent {
            rate: dec!(0.0003),
            minimum: dec!(5),
        });
        // 100 * 10 * 0.0003 = 0.3, floored to the minimum
        assert_eq!(percent.commission(100, dec!(10)), dec!(5));
        assert_eq!(percent.commission(100_000, dec!(10)), dec!(300));
    }

    #[test]
    fn test_slippage_moves_against_side() {
        let fixed = slippage_model(&SlippageConfig::Fixed { amount: dec!(0.02) });
        assert_eq!(fixed.apply(dec!(10), Side::Buy), dec!(10.02));
        assert_eq!(fixed.apply(dec!(10), Side::Sell), dec!(9.98));
        assert_eq!(fixed.apply(dec!(0.01), Side::Sell), dec!(0));

        let percent = slippage_model(&SlippageConfig::Percent { rate: dec!(0.01) });
        assert_eq!(percent.apply(dec!(100), Side::Buy), dec!(101));
        assert!(percent.apply(dec!(101), Side::Sell) < dec!(101));

        assert_eq!(slippage_model(&SlippageConfig::Zero).apply(dec!(7), Side::Buy), dec!(7));
    }
}
