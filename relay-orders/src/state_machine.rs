//! Order lifecycle state machine
//!
//! Three handlers on the dispatch engine own all order state:
//!
//! | handler           | kind         | topic | priority |
//! |-------------------|--------------|-------|----------|
//! | `on_order`        | ORDER        | `""`  | 0        |
//! | `on_execution`    | EXECUTION    | `"."` | -100     |
//! | `on_order_status` | ORDER_STATUS | `"."` | -100     |
//!
//! Orders are emitted on topic `""` so `on_order` runs before any gateway
//! listening on `"."`. Status moves only on ORDER_STATUS; executions are a
//! separate ledger that is cross-checked against status but never applied to it.

use crate::adapter::OrderAdapter;
use crate::environment::{Environment, Security, SecurityRef};
use crate::error::OrderError;
use crate::persistence::{find_by_global_id, sorted_by_time, Persistence};
use crate::proxy::{OpenOrders, OrderProxy};
use crate::sizing::{percent_to_value, value_to_shares};
use crate::style::OrderStyle;
use parking_lot::{Mutex, RwLock};
use relay_core::engine::{Handler, HandlerId, Scratch};
use relay_core::{
    CancelReq, DispatchEngine, Event, EventKind, EventSender, ExecutionData, GlobalOrderId,
    OrderReq, OrderStatus, OrderStatusData, ALL_TOPICS,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Topic of ORDER events emitted by the state machine
pub const ORDER_TOPIC: &str = "";

pub const ON_ORDER_PRIORITY: i32 = 0;
pub const FEEDBACK_PRIORITY: i32 = -100;

/// Outcome of a submission call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// ORDER event enqueued for this id
    Submitted(GlobalOrderId),
    /// Nothing to trade (zero amount or already at target)
    NoOp,
}

impl Submission {
    pub fn order_id(&self) -> Option<&GlobalOrderId> {
        match self {
            Submission::Submitted(id) => Some(id),
            Submission::NoOp => None,
        }
    }
}

/// What `cancel_order` can be pointed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelTarget {
    Order(GlobalOrderId),
    /// A request that never received a client id
    Unassigned { symbol: String },
}

impl From<GlobalOrderId> for CancelTarget {
    fn from(id: GlobalOrderId) -> Self {
        CancelTarget::Order(id)
    }
}

impl From<&GlobalOrderId> for CancelTarget {
    fn from(id: &GlobalOrderId) -> Self {
        CancelTarget::Order(id.clone())
    }
}

impl From<&OrderReq> for CancelTarget {
    fn from(req: &OrderReq) -> Self {
        match req.g_cl_ord_id() {
            Some(id) => CancelTarget::Order(id),
            None => CancelTarget::Unassigned {
                symbol: req.symbol.clone(),
            },
        }
    }
}

impl From<&OrderProxy> for CancelTarget {
    fn from(proxy: &OrderProxy) -> Self {
        CancelTarget::Order(proxy.g_cl_ord_id().clone())
    }
}

struct Inner {
    sender: EventSender,
    env: Arc<dyn Environment>,
    adapter: Arc<dyn OrderAdapter>,
    persistence: Arc<dyn Persistence>,
    proxies: RwLock<HashMap<GlobalOrderId, OrderProxy>>,
    open_orders: RwLock<BTreeMap<String, OpenOrders>>,
    /// Filled quantity per order, summed from EXECUTION events
    filled: Mutex<HashMap<GlobalOrderId, u64>>,
    next_id: AtomicU64,
    drift: AtomicU64,
}

impl Inner {
    fn on_order(&self, event: &Event) -> Result<(), OrderError> {
        let Some(req) = event.as_order() else {
            return Ok(());
        };
        let g_cl_ord_id = req
            .g_cl_ord_id()
            .ok_or_else(|| OrderError::MissingClientId {
                symbol: req.symbol.clone(),
            })?;

        let status = OrderStatusData::generated(req, g_cl_ord_id.clone(), self.env.current_time());
        self.persistence.order_status().insert(status.clone())?;
        self.persistence.orders().insert(req.clone())?;

        let proxy = OrderProxy::new(g_cl_ord_id.clone(), req.clone(), status);
        self.index(proxy);

        debug!(order = %g_cl_ord_id, symbol = %req.symbol, qty = req.order_qty, "Order created");
        Ok(())
    }

    fn on_execution(&self, event: &Event) -> Result<(), OrderError> {
        let Some(exec) = event.as_execution() else {
            return Ok(());
        };
        self.persistence.executions().insert(exec.clone())?;
        *self
            .filled
            .lock()
            .entry(exec.g_cl_ord_id.clone())
            .or_insert(0) += exec.last_qty;

        debug!(order = %exec.g_cl_ord_id, qty = exec.last_qty, px = %exec.last_px, "Execution recorded");
        Ok(())
    }

    fn on_order_status(&self, event: &Event) -> Result<(), OrderError> {
        let Some(status) = event.as_order_status() else {
            return Ok(());
        };
        self.persistence.order_status().insert(status.clone())?;

        let proxy = self.proxies.read().get(&status.g_cl_ord_id).cloned();
        match proxy {
            Some(proxy) => {
                self.check_ledger(status);
                proxy.set_status(status.clone());
            }
            None => {
                warn!(order = %status.g_cl_ord_id, status = %status.ord_status, "Status for unknown order");
            }
        }

        if status.ord_status.is_terminal() {
            let mut open = self.open_orders.write();
            if let Some(orders) = open.get_mut(&status.symbol) {
                orders.remove(&status.g_cl_ord_id);
                if orders.is_empty() {
                    open.remove(&status.symbol);
                }
            }
        }

        debug!(order = %status.g_cl_ord_id, status = %status.ord_status, leaves = status.leaves_qty, "Status applied");
        Ok(())
    }

    /// Compare inbound leaves with what the execution ledger implies
    fn check_ledger(&self, status: &OrderStatusData) {
        if matches!(status.ord_status, OrderStatus::Cancelled | OrderStatus::Unknown) {
            return;
        }
        let filled = self
            .filled
            .lock()
            .get(&status.g_cl_ord_id)
            .copied()
            .unwrap_or(0);
        let expected = status.order_qty.saturating_sub(filled);
        if expected != status.leaves_qty {
            self.drift.fetch_add(1, Ordering::Relaxed);
            warn!(
                order = %status.g_cl_ord_id,
                leaves = status.leaves_qty,
                expected,
                filled,
                "Status and execution ledgers disagree"
            );
        }
    }

    fn index(&self, proxy: OrderProxy) {
        if proxy.is_open() {
            self.open_orders
                .write()
                .entry(proxy.symbol().to_string())
                .or_default()
                .insert(proxy.clone());
        }
        self.proxies
            .write()
            .insert(proxy.g_cl_ord_id().clone(), proxy);
    }
}

type Apply = fn(&Inner, &Event) -> Result<(), OrderError>;

struct LifecycleHandler {
    name: &'static str,
    inner: Arc<Inner>,
    apply: Apply,
}

impl Handler for LifecycleHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn handle(&self, event: &Event, _scratch: &mut Scratch) -> anyhow::Result<()> {
        (self.apply)(self.inner.as_ref(), event)?;
        Ok(())
    }
}

/// Creates, indexes and retires orders; the strategy-facing order API
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct OrderStateMachine {
    inner: Arc<Inner>,
}

impl OrderStateMachine {
    pub fn new(
        sender: EventSender,
        env: Arc<dyn Environment>,
        adapter: Arc<dyn OrderAdapter>,
        persistence: Arc<dyn Persistence>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                sender,
                env,
                adapter,
                persistence,
                proxies: RwLock::new(HashMap::new()),
                open_orders: RwLock::new(BTreeMap::new()),
                filled: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                drift: AtomicU64::new(0),
            }),
        }
    }

    /// Register `on_order`, `on_execution` and `on_order_status`
    pub fn register(&self, engine: &DispatchEngine) -> [HandlerId; 3] {
        let handler = |name: &'static str, apply: Apply| -> Arc<dyn Handler> {
            Arc::new(LifecycleHandler {
                name,
                inner: Arc::clone(&self.inner),
                apply,
            })
        };

        let ids = [
            engine.register(
                handler("on_order", Inner::on_order),
                EventKind::Order,
                ORDER_TOPIC,
                ON_ORDER_PRIORITY,
            ),
            engine.register(
                handler("on_execution", Inner::on_execution),
                EventKind::Execution,
                ALL_TOPICS,
                FEEDBACK_PRIORITY,
            ),
            engine.register(
                handler("on_order_status", Inner::on_order_status),
                EventKind::OrderStatus,
                ALL_TOPICS,
                FEEDBACK_PRIORITY,
            ),
        ];
        info!("Order state machine registered");
        ids
    }

    /// Rebuild proxies, the open index and the id counter from persistence
    ///
    /// Used after replaying a journal into a fresh store. Returns the number
    /// of orders restored.
    pub fn recover(&self) -> Result<usize, OrderError> {
        let persistence = &self.inner.persistence;
        let mut restored = 0;
        let mut max_id = 0;

        for req in persistence.orders().find_all()? {
            let Some(g_cl_ord_id) = req.g_cl_ord_id() else {
                continue;
            };
            let status = match find_by_global_id(persistence.order_status(), &g_cl_ord_id)? {
                Some(status) => status,
                None => OrderStatusData::generated(&req, g_cl_ord_id.clone(), req.transact_time),
            };
            max_id = max_id.max(req.cl_ord_id.unwrap_or(0));
            self.inner
                .index(OrderProxy::new(g_cl_ord_id, req, status));
            restored += 1;
        }

        {
            let mut filled = self.inner.filled.lock();
            filled.clear();
            for exec in persistence.executions().find_all()? {
                *filled.entry(exec.g_cl_ord_id).or_insert(0) += exec.last_qty;
            }
        }

        self.inner.next_id.fetch_max(max_id, Ordering::SeqCst);
        info!(restored, next_id = max_id + 1, "Order state recovered");
        Ok(restored)
    }

    fn next_cl_ord_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn resolve(&self, security: SecurityRef) -> Result<Security, OrderError> {
        match security {
            SecurityRef::Resolved(security) => Ok(security),
            SecurityRef::Ticker(ticker) => self
                .inner
                .env
                .symbol(&ticker)
                .ok_or(OrderError::SecurityNotFound(ticker)),
        }
    }

    fn price(&self, security: &Security) -> Result<Decimal, OrderError> {
        self.inner
            .env
            .current_price(&security.symbol)
            .ok_or_else(|| OrderError::PriceUnavailable(security.symbol.clone()))
    }

    fn submit(&self, security: &Security, amount: i64, style: &OrderStyle) -> Result<Submission, OrderError> {
        if amount == 0 {
            return Ok(Submission::NoOp);
        }

        let req = self
            .inner
            .adapter
            .parse(security, amount, style, self.inner.env.current_time())?
            .with_cl_ord_id(self.next_cl_ord_id());
        let g_cl_ord_id = req
            .g_cl_ord_id()
            .ok_or_else(|| OrderError::MissingClientId {
                symbol: req.symbol.clone(),
            })?;

        self.send_order(req);
        Ok(Submission::Submitted(g_cl_ord_id))
    }

    fn submit_target(&self, security: &Security, target: i64, style: &OrderStyle) -> Result<Submission, OrderError> {
        let current = self.inner.env.position_volume(&security.symbol);
        let delta = target
            .checked_sub(current)
            .ok_or_else(|| OrderError::SizeOverflow(security.symbol.clone()))?;
        self.submit(security, delta, style)
    }

    /// Trade `amount` shares; negative sells
    pub fn order(
        &self,
        security: impl Into<SecurityRef>,
        amount: i64,
        style: OrderStyle,
    ) -> Result<Submission, OrderError> {
        let security = self.resolve(security.into())?;
        self.submit(&security, amount, &style)
    }

    /// Trade the difference between `target` and the current position
    pub fn order_target(
        &self,
        security: impl Into<SecurityRef>,
        target: i64,
        style: OrderStyle,
    ) -> Result<Submission, OrderError> {
        let security = self.resolve(security.into())?;
        self.submit_target(&security, target, &style)
    }

    /// Trade `value` worth of shares at the current price, truncated to whole shares
    pub fn order_value(
        &self,
        security: impl Into<SecurityRef>,
        value: Decimal,
        style: OrderStyle,
    ) -> Result<Submission, OrderError> {
        let security = self.resolve(security.into())?;
        let shares = value_to_shares(&security, value, self.price(&security)?)?;
        self.submit(&security, shares, &style)
    }

    pub fn order_target_value(
        &self,
        security: impl Into<SecurityRef>,
        value: Decimal,
        style: OrderStyle,
    ) -> Result<Submission, OrderError> {
        let security = self.resolve(security.into())?;
        let target = value_to_shares(&security, value, self.price(&security)?)?;
        self.submit_target(&security, target, &style)
    }

    /// Trade `percent` of portfolio value (0.5 is half)
    pub fn order_percent(
        &self,
        security: impl Into<SecurityRef>,
        percent: Decimal,
        style: OrderStyle,
    ) -> Result<Submission, OrderError> {
        let security = self.resolve(security.into())?;
        let value = percent_to_value(self.inner.env.portfolio_value(), percent)?;
        let shares = value_to_shares(&security, value, self.price(&security)?)?;
        self.submit(&security, shares, &style)
    }

    pub fn order_target_percent(
        &self,
        security: impl Into<SecurityRef>,
        percent: Decimal,
        style: OrderStyle,
    ) -> Result<Submission, OrderError> {
        let security = self.resolve(security.into())?;
        let value = percent_to_value(self.inner.env.portfolio_value(), percent)?;
        let target = value_to_shares(&security, value, self.price(&security)?)?;
        self.submit_target(&security, target, &style)
    }

    /// Enqueue an ORDER event; the outcome arrives later as ORDER_STATUS
    pub fn send_order(&self, req: OrderReq) {
        self.inner
            .sender
            .put(Event::order(req).with_topic(ORDER_TOPIC));
    }

    /// Enqueue a CANCEL event; confirmation arrives later as ORDER_STATUS
    pub fn cancel_order(&self, target: impl Into<CancelTarget>) -> Result<(), OrderError> {
        let g_cl_ord_id = match target.into() {
            CancelTarget::Order(id) => id,
            CancelTarget::Unassigned { symbol } => {
                return Err(OrderError::MissingClientId { symbol })
            }
        };
        let cancel = CancelReq::for_order(g_cl_ord_id.clone())
            .ok_or_else(|| OrderError::InvalidOrderId(g_cl_ord_id.to_string()))?;

        debug!(order = %g_cl_ord_id, "Cancel requested");
        self.inner.sender.put(Event::cancel(cancel));
        Ok(())
    }

    /// Live proxy for an order, open or not, until evicted
    pub fn get_order(&self, g_cl_ord_id: &GlobalOrderId) -> Option<OrderProxy> {
        self.inner.proxies.read().get(g_cl_ord_id).cloned()
    }

    /// Snapshot of one symbol's open orders; empty when there are none
    pub fn get_open_orders(&self, symbol: &str) -> OpenOrders {
        self.inner
            .open_orders
            .read()
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every symbol's open orders
    pub fn get_all_open_orders(&self) -> BTreeMap<String, OpenOrders> {
        self.inner.open_orders.read().clone()
    }

    /// Latest persisted status snapshot
    pub fn get_order_status(&self, g_cl_ord_id: &GlobalOrderId) -> Result<Option<OrderStatusData>, OrderError> {
        Ok(find_by_global_id(
            self.inner.persistence.order_status(),
            g_cl_ord_id,
        )?)
    }

    /// Every order request, by transact time
    pub fn get_orders(&self) -> Result<Vec<OrderReq>, OrderError> {
        Ok(sorted_by_time(self.inner.persistence.orders().find_all()?))
    }

    /// Every execution, by fill time
    pub fn get_executions(&self) -> Result<Vec<ExecutionData>, OrderError> {
        Ok(sorted_by_time(self.inner.persistence.executions().find_all()?))
    }

    /// Every status snapshot, by order time
    pub fn get_status(&self) -> Result<Vec<OrderStatusData>, OrderError> {
        Ok(sorted_by_time(self.inner.persistence.order_status().find_all()?))
    }

    /// Forget an order's proxy and open-index entry; persistence is untouched
    pub fn evict(&self, g_cl_ord_id: &GlobalOrderId) -> Option<OrderProxy> {
        let proxy = self.inner.proxies.write().remove(g_cl_ord_id)?;

        let mut open = self.inner.open_orders.write();
        if let Some(orders) = open.get_mut(proxy.symbol()) {
            orders.remove(g_cl_ord_id);
            if orders.is_empty() {
                open.remove(proxy.symbol());
            }
        }
        self.inner.filled.lock().remove(g_cl_ord_id);
        Some(proxy)
    }

    /// Filled quantity according to the execution ledger
    pub fn filled_qty(&self, g_cl_ord_id: &GlobalOrderId) -> u64 {
        self.inner
            .filled
            .lock()
            .get(g_cl_ord_id)
            .copied()
            .unwrap_or(0)
    }

    /// Status updates whose leaves disagreed with the execution ledger
    pub fn drift_count(&self) -> u64 {
        self.inner.drift.load(Ordering::Relaxed)
    }
}
