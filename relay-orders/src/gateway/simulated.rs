//! Simulated gateway for backtests
//!
//! Answers ORDER and CANCEL events with ORDER_STATUS and EXECUTION events.
//! Every order is acknowledged NOTTRADED first. In `Immediate` mode it is then
//! filled in full at the slipped reference price; in `Resting` mode it waits
//! for [`SimulatedGateway::fill`] or a cancel.
//!
//! The reference price is the order's limit price when it has one, otherwise
//! the last TICK/BAR price seen for the symbol.

use super::costs::{commission_model, slippage_model, CommissionModel, SlippageModel};
use crate::error::GatewayError;
use parking_lot::{Mutex, RwLock};
use relay_core::config::{GatewayConfig, GatewayMode};
use relay_core::engine::{Handler, HandlerId, Scratch};
use relay_core::{
    DispatchEngine, Event, EventKind, EventSender, ExecutionData, GlobalOrderId, OrderReq,
    OrderStatus, OrderStatusData, Payload, ALL_TOPICS,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// An acknowledged order waiting for fills
#[derive(Debug, Clone)]
struct RestingOrder {
    req: OrderReq,
    status: OrderStatusData,
}

struct GatewayInner {
    name: String,
    sender: EventSender,
    mode: GatewayMode,
    commission: Box<dyn CommissionModel>,
    slippage: Box<dyn SlippageModel>,
    prices: RwLock<HashMap<String, Decimal>>,
    clock: RwLock<Option<SystemTime>>,
    resting: Mutex<HashMap<GlobalOrderId, RestingOrder>>,
    exec_seq: AtomicU64,
}

impl GatewayInner {
    fn now(&self) -> SystemTime {
        self.clock.read().unwrap_or_else(SystemTime::now)
    }

    fn reference_price(&self, req: &OrderReq) -> Option<Decimal> {
        if req.price > Decimal::ZERO {
            return Some(req.price);
        }
        self.prices.read().get(&req.symbol).copied()
    }

    fn on_market(&self, event: &Event) -> Result<(), GatewayError> {
        let (symbol, price, time) = match event.payload() {
            Payload::Tick(tick) => (&tick.symbol, tick.reference_price(), tick.time),
            Payload::Bar(bar) => (&bar.symbol, bar.close, bar.time),
            _ => return Ok(()),
        };
        self.prices.write().insert(symbol.clone(), price);
        *self.clock.write() = Some(time);
        Ok(())
    }

    fn on_order(&self, event: &Event) -> Result<(), GatewayError> {
        let Some(req) = event.as_order() else {
            return Ok(());
        };
        // The state machine reports orders without a client id
        let Some(g_cl_ord_id) = req.g_cl_ord_id() else {
            return Ok(());
        };

        let acked = OrderStatusData::generated(req, g_cl_ord_id.clone(), self.now())
            .next(OrderStatus::NotTraded, req.order_qty, self.now());
        self.sender.put(Event::order_status(acked.clone()));

        self.resting.lock().insert(
            g_cl_ord_id.clone(),
            RestingOrder {
                req: req.clone(),
                status: acked,
            },
        );
        debug!(gateway = %self.name, order = %g_cl_ord_id, "Order acknowledged");

        if self.mode == GatewayMode::Immediate {
            match self.fill(&g_cl_ord_id, req.order_qty) {
                Ok(()) => {}
                Err(GatewayError::NoPrice(symbol)) => {
                    warn!(order = %g_cl_ord_id, symbol = %symbol, "No price yet, order left resting");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn on_cancel(&self, event: &Event) -> Result<(), GatewayError> {
        let Some(cancel) = event.as_cancel() else {
            return Ok(());
        };

        match self.resting.lock().remove(&cancel.g_cl_ord_id) {
            Some(resting) => {
                let cancelled = resting.status.next(
                    OrderStatus::Cancelled,
                    resting.status.leaves_qty,
                    self.now(),
                );
                self.sender.put(Event::order_status(cancelled));
                debug!(gateway = %self.name, order = %cancel.g_cl_ord_id, "Order cancelled");
            }
            None => {
                warn!(gateway = %self.name, order = %cancel.g_cl_ord_id, "Cancel for order that is not resting");
            }
        }
        Ok(())
    }

    fn fill(&self, g_cl_ord_id: &GlobalOrderId, qty: u64) -> Result<(), GatewayError> {
        if qty == 0 {
            return Err(GatewayError::ZeroQuantity);
        }

        let mut resting = self.resting.lock();
        let order = resting
            .get_mut(g_cl_ord_id)
            .ok_or_else(|| GatewayError::UnknownOrder(g_cl_ord_id.clone()))?;

        let leaves = order.status.leaves_qty;
        if qty > leaves {
            return Err(GatewayError::Overfill {
                order: g_cl_ord_id.clone(),
                requested: qty,
                leaves,
            });
        }
        let price = self
            .reference_price(&order.req)
            .ok_or_else(|| GatewayError::NoPrice(order.req.symbol.clone()))?;

        let last_px = self.slippage.apply(price, order.req.side);
        let now = self.now();
        let execution = ExecutionData {
            exec_id: format!(
                "{}-{}",
                self.name,
                self.exec_seq.fetch_add(1, Ordering::Relaxed) + 1
            ),
            g_cl_ord_id: g_cl_ord_id.clone(),
            cl_ord_id: order.status.cl_ord_id,
            time: now,
            symbol: order.req.symbol.clone(),
            exchange: order.req.exchange.clone(),
            side: order.req.side,
            action: order.req.action,
            last_qty: qty,
            last_px,
            commission: self.commission.commission(qty, last_px),
            gateway: order.req.gateway.clone(),
            account: order.req.account.clone(),
        };

        let leaves = leaves - qty;
        let ord_status = if leaves == 0 {
            OrderStatus::AllTraded
        } else {
            OrderStatus::PartTraded
        };
        order.status = order.status.next(ord_status, leaves, now);

        // Execution first so the ledger is current when the status lands
        self.sender.put(Event::execution(execution));
        self.sender.put(Event::order_status(order.status.clone()));

        debug!(gateway = %self.name, order = %g_cl_ord_id, qty, px = %last_px, status = %ord_status, "Order filled");
        if leaves == 0 {
            resting.remove(g_cl_ord_id);
        }
        Ok(())
    }
}

type Apply = fn(&GatewayInner, &Event) -> Result<(), GatewayError>;

struct GatewayHandler {
    name: &'static str,
    inner: Arc<GatewayInner>,
    apply: Apply,
}

impl Handler for GatewayHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn handle(&self, event: &Event, _scratch: &mut Scratch) -> anyhow::Result<()> {
        (self.apply)(self.inner.as_ref(), event)?;
        Ok(())
    }
}

/// In-process gateway that fills orders against tracked prices
#[derive(Clone)]
pub struct SimulatedGateway {
    inner: Arc<GatewayInner>,
}

impl SimulatedGateway {
    pub fn new(
        name: impl Into<String>,
        sender: EventSender,
        mode: GatewayMode,
        commission: Box<dyn CommissionModel>,
        slippage: Box<dyn SlippageModel>,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                name: name.into(),
                sender,
                mode,
                commission,
                slippage,
                prices: RwLock::new(HashMap::new()),
                clock: RwLock::new(None),
                resting: Mutex::new(HashMap::new()),
                exec_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn from_config(name: impl Into<String>, sender: EventSender, config: &GatewayConfig) -> Self {
        Self::new(
            name,
            sender,
            config.mode,
            commission_model(&config.commission),
            slippage_model(&config.slippage),
        )
    }

    /// Register the ORDER, CANCEL, TICK and BAR handlers on `"."`
    pub fn register(&self, engine: &DispatchEngine) -> Vec<HandlerId> {
        let handler = |name: &'static str, apply: Apply| -> Arc<dyn Handler> {
            Arc::new(GatewayHandler {
                name,
                inner: Arc::clone(&self.inner),
                apply,
            })
        };

        let ids = vec![
            engine.register(
                handler("gateway_order", GatewayInner::on_order),
                EventKind::Order,
                ALL_TOPICS,
                0,
            ),
            engine.register(
                handler("gateway_cancel", GatewayInner::on_cancel),
                EventKind::Cancel,
                ALL_TOPICS,
                0,
            ),
            engine.register(
                handler("gateway_tick", GatewayInner::on_market),
                EventKind::Tick,
                ALL_TOPICS,
                0,
            ),
            engine.register(
                handler("gateway_bar", GatewayInner::on_market),
                EventKind::Bar,
                ALL_TOPICS,
                0,
            ),
        ];
        info!(gateway = %self.inner.name, mode = ?self.inner.mode, "Simulated gateway registered");
        ids
    }

    /// Fill `qty` of a resting order; emits EXECUTION then ORDER_STATUS
    pub fn fill(&self, g_cl_ord_id: &GlobalOrderId, qty: u64) -> Result<(), GatewayError> {
        self.inner.fill(g_cl_ord_id, qty)
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.inner.prices.write().insert(symbol.to_string(), price);
    }

    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.inner.prices.read().get(symbol).copied()
    }

    pub fn is_resting(&self, g_cl_ord_id: &GlobalOrderId) -> bool {
        self.inner.resting.lock().contains_key(g_cl_ord_id)
    }

    pub fn resting_count(&self) -> usize {
        self.inner.resting.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::costs::{PerShareCommission, ZeroSlippage};
    use relay_core::testing::{create_test_order, create_test_tick};
    use relay_core::Side;
    use rust_decimal_macros::dec;

    fn gateway(engine: &DispatchEngine, mode: GatewayMode) -> SimulatedGateway {
        SimulatedGateway::new(
            "sim",
            engine.sender(),
            mode,
            Box::new(PerShareCommission { rate: dec!(0.01) }),
            Box::new(ZeroSlippage),
        )
    }

    fn drain(engine: &DispatchEngine) -> Vec<Event> {
        engine.take_pending()
    }

    #[test]
    fn test_immediate_fill() {
        let engine = DispatchEngine::new();
        let gw = gateway(&engine, GatewayMode::Immediate);
        let req = create_test_order("000001", Side::Buy, 100, dec!(10)).with_cl_ord_id(1);
        gw.inner.on_order(&Event::order(req)).unwrap();

        let events = drain(&engine);
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![EventKind::OrderStatus, EventKind::Execution, EventKind::OrderStatus]
        );
        let exec = events[1].as_execution().unwrap();
        assert_eq!(exec.last_qty, 100);
        assert_eq!(exec.last_px, dec!(10));
        assert_eq!(exec.commission, dec!(1));
        assert_eq!(events[2].as_order_status().unwrap().ord_status, OrderStatus::AllTraded);
        assert_eq!(gw.resting_count(), 0);
    }

    #[test]
    fn test_market_order_waits_for_price() {
        let engine = DispatchEngine::new();
        let gw = gateway(&engine, GatewayMode::Immediate);
        let req = create_test_order("000001", Side::Buy, 10, dec!(0)).with_cl_ord_id(1);
        let gid = req.g_cl_ord_id().unwrap();
        gw.inner.on_order(&Event::order(req)).unwrap();
        assert!(gw.is_resting(&gid));

        gw.inner
            .on_market(&Event::tick(create_test_tick("000001", dec!(12))))
            .unwrap();
        assert_eq!(gw.last_price("000001"), Some(dec!(12)));
        gw.fill(&gid, 10).unwrap();
        assert!(!gw.is_resting(&gid));
    }

    #[test]
    fn test_resting_partial_fill_and_cancel() {
        let engine = DispatchEngine::new();
        let gw = gateway(&engine, GatewayMode::Resting);
        let req = create_test_order("000001", Side::Sell, 100, dec!(10)).with_cl_ord_id(7);
        let gid = req.g_cl_ord_id().unwrap();
        gw.inner.on_order(&Event::order(req)).unwrap();

        assert!(matches!(gw.fill(&gid, 0), Err(GatewayError::ZeroQuantity)));
        assert!(matches!(gw.fill(&gid, 101), Err(GatewayError::Overfill { leaves: 100, .. })));
        gw.fill(&gid, 40).unwrap();

        let cancel = relay_core::CancelReq::for_order(gid.clone()).unwrap();
        gw.inner.on_cancel(&Event::cancel(cancel)).unwrap();
        assert!(matches!(gw.fill(&gid, 1), Err(GatewayError::UnknownOrder(_))));

        let statuses: Vec<_> = drain(&engine)
            .iter()
            .filter_map(|e| e.as_order_status().map(|s| (s.ord_status, s.leaves_qty)))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (OrderStatus::NotTraded, 100),
                (OrderStatus::PartTraded, 60),
                (OrderStatus::Cancelled, 60),
            ]
        );
    }
}
