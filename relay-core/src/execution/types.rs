use crate::core::{ClOrdId, GlobalOrderId, OrderAction, OrderStatus, OrderType, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A concrete order request produced from a trade intent
///
/// Built once by an adapter; the client id is attached with
/// [`OrderReq::with_cl_ord_id`] before submission and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReq {
    /// Local client id; `None` means submission failed upstream
    pub cl_ord_id: Option<ClOrdId>,
    pub gateway: String,
    pub account: String,
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub action: OrderAction,
    pub order_type: OrderType,
    /// Limit price (zero for market orders)
    pub price: Decimal,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    pub order_qty: u64,
    pub transact_time: SystemTime,
}

impl OrderReq {
    pub fn with_cl_ord_id(mut self, cl_ord_id: ClOrdId) -> Self {
        self.cl_ord_id = Some(cl_ord_id);
        self
    }

    /// Global identity, available once a client id has been assigned
    pub fn g_cl_ord_id(&self) -> Option<GlobalOrderId> {
        self.cl_ord_id
            .map(|id| GlobalOrderId::new(&self.gateway, &self.account, id))
    }
}

/// Full status snapshot of one order
///
/// Snapshots are never patched in place: every update inserts a new one and
/// the latest is the order's current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusData {
    pub g_cl_ord_id: GlobalOrderId,
    pub cl_ord_id: ClOrdId,
    pub symbol: String,
    pub exchange: String,
    pub action: OrderAction,
    pub side: Side,
    pub price: Decimal,
    pub order_qty: u64,
    pub leaves_qty: u64,
    pub ord_status: OrderStatus,
    pub order_time: SystemTime,
    pub gateway: String,
    pub account: String,
}

impl OrderStatusData {
    /// Initial GENERATE snapshot for a request carrying a client id
    pub fn generated(req: &OrderReq, g_cl_ord_id: GlobalOrderId, order_time: SystemTime) -> Self {
        Self {
            cl_ord_id: req.cl_ord_id.unwrap_or_default(),
            g_cl_ord_id,
            symbol: req.symbol.clone(),
            exchange: req.exchange.clone(),
            action: req.action,
            side: req.side,
            price: req.price,
            order_qty: req.order_qty,
            leaves_qty: req.order_qty,
            ord_status: OrderStatus::Generate,
            order_time,
            gateway: req.gateway.clone(),
            account: req.account.clone(),
        }
    }

    /// A new snapshot derived from this one
    pub fn next(&self, ord_status: OrderStatus, leaves_qty: u64, order_time: SystemTime) -> Self {
        Self {
            ord_status,
            leaves_qty,
            order_time,
            ..self.clone()
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        !self.ord_status.is_terminal()
    }

    /// Quantity filled according to this snapshot
    #[inline]
    pub fn filled_qty(&self) -> u64 {
        self.order_qty.saturating_sub(self.leaves_qty)
    }
}

/// One fill; the execution ledger is append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionData {
    pub exec_id: String,
    pub g_cl_ord_id: GlobalOrderId,
    pub cl_ord_id: ClOrdId,
    pub time: SystemTime,
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub action: OrderAction,
    pub last_qty: u64,
    pub last_px: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    pub gateway: String,
    pub account: String,
}

impl ExecutionData {
    pub fn notional(&self) -> Decimal {
        self.last_px * Decimal::from(self.last_qty)
    }
}

/// Cancellation request, addressed by client id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelReq {
    pub g_cl_ord_id: GlobalOrderId,
    pub cl_ord_id: ClOrdId,
}

impl CancelReq {
    /// Build from a global id; `None` if the id does not end in a client id
    pub fn for_order(g_cl_ord_id: GlobalOrderId) -> Option<Self> {
        let cl_ord_id = g_cl_ord_id.cl_ord_id()?;
        Some(Self {
            g_cl_ord_id,
            cl_ord_id,
        })
    }
}
