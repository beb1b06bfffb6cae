//! Core vocabulary types shared by the dispatch engine and the order lifecycle
//!
//! All enums are `Copy` and serializable so they can travel inside events,
//! journal entries and configuration files.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Side implied by the sign of a signed share amount (zero counts as Buy)
    #[inline]
    pub fn from_amount(amount: i64) -> Self {
        if amount < 0 {
            Side::Sell
        } else {
            Side::Buy
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Position effect of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderAction {
    None,
    Open,
    Close,
    Unknown,
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

/// Order status as reported by a gateway
///
/// `AllTraded` and `Cancelled` are terminal: an order in either state is
/// no longer open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created locally, not yet seen by the gateway
    Generate,
    /// Stop condition triggered
    Triggered,
    /// Accepted, nothing filled yet
    NotTraded,
    /// Partially filled
    PartTraded,
    /// Fully filled (terminal)
    AllTraded,
    /// Cancelled (terminal)
    Cancelled,
    Unknown,
}

impl OrderStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::AllTraded | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Generate => "GENERATE",
            OrderStatus::Triggered => "TRIGGERED",
            OrderStatus::NotTraded => "NOTTRADED",
            OrderStatus::PartTraded => "PARTTRADED",
            OrderStatus::AllTraded => "ALLTRADED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Process-local client order id, assigned from a monotonic counter
pub type ClOrdId = u64;

/// Globally unique client order id: `gateway.account.clOrdID`
///
/// The three components are recoverable with [`GlobalOrderId::parts`], which is
/// how DAO lookups by (gateway, account, id) are addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalOrderId(String);

impl GlobalOrderId {
    pub fn new(gateway: &str, account: &str, cl_ord_id: ClOrdId) -> Self {
        Self(format!("{}.{}.{}", gateway, account, cl_ord_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into (gateway, account, clOrdID)
    ///
    /// Gateway names may not contain '.', account names may; the client id is
    /// always the last segment.
    pub fn parts(&self) -> Option<(&str, &str, ClOrdId)> {
        let (gateway, rest) = self.0.split_once('.')?;
        let (account, id) = rest.rsplit_once('.')?;
        let id = id.parse().ok()?;
        Some((gateway, account, id))
    }

    pub fn cl_ord_id(&self) -> Option<ClOrdId> {
        self.parts().map(|(_, _, id)| id)
    }
}

impl fmt::Display for GlobalOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GlobalOrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GlobalOrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
