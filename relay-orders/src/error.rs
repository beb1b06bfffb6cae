//! Error types for order submission, persistence and the simulated gateway

use relay_core::GlobalOrderId;
use thiserror::Error;

/// Storage failures
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("journal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record cannot be keyed (no client id)
    #[error("record for symbol '{symbol}' has no client order id")]
    MissingKey { symbol: String },

    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

/// Order submission and lifecycle failures
#[derive(Debug, Error)]
pub enum OrderError {
    /// The environment does not know the ticker
    #[error("security not found: {0}")]
    SecurityNotFound(String),

    /// No usable price to convert a value into shares
    #[error("no price available for {0}")]
    PriceUnavailable(String),

    #[error("security {0} has a non-positive point value")]
    InvalidPointValue(String),

    /// Value/percent sizing does not fit in a share count
    #[error("order size for {0} overflows")]
    SizeOverflow(String),

    /// An ORDER event reached the state machine without a client id
    #[error("order for {symbol} carries no client order id")]
    MissingClientId { symbol: String },

    /// A global id that does not end in a client id
    #[error("malformed order id: {0}")]
    InvalidOrderId(String),

    #[error("adapter rejected order: {0}")]
    Adapter(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Simulated gateway operations
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("order {0} is not resting at the gateway")]
    UnknownOrder(GlobalOrderId),

    #[error("fill of {requested} exceeds leaves quantity {leaves} for {order}")]
    Overfill {
        order: GlobalOrderId,
        requested: u64,
        leaves: u64,
    },

    #[error("fill quantity must be positive")]
    ZeroQuantity,

    #[error("no price available to fill {0}")]
    NoPrice(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_converts_into_order_error() {
        let err: OrderError = PersistenceError::Unavailable("offline".to_string()).into();
        assert!(matches!(err, OrderError::Persistence(_)));
        assert_eq!(err.to_string(), "persistence unavailable: offline");
    }

    #[test]
    fn test_error_messages() {
        let err = OrderError::MissingClientId {
            symbol: "000001".to_string(),
        };
        assert!(err.to_string().contains("000001"));

        let err = GatewayError::Overfill {
            order: GlobalOrderId::new("sim", "a", 1),
            requested: 10,
            leaves: 5,
        };
        assert_eq!(err.to_string(), "fill of 10 exceeds leaves quantity 5 for sim.a.1");
    }
}
