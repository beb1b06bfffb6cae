//! Reference gateway used by backtests and integration tests

pub mod costs;
pub mod simulated;

pub use costs::{
    commission_model, slippage_model, CommissionModel, FixedSlippage, PerShareCommission,
    PercentCommission, PercentSlippage, SlippageModel, ZeroCommission, ZeroSlippage,
};
pub use simulated::SimulatedGateway;
