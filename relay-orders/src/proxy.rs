//! Live order views and the insertion-ordered open-order map

use parking_lot::RwLock;
use relay_core::{GlobalOrderId, OrderReq, OrderStatus, OrderStatusData};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One order request bound to its latest status snapshot
///
/// Clones share the status cell, so every holder observes updates made by the
/// state machine. Only the state machine writes it.
#[derive(Debug, Clone)]
pub struct OrderProxy {
    g_cl_ord_id: GlobalOrderId,
    req: Arc<OrderReq>,
    status: Arc<RwLock<OrderStatusData>>,
}

impl OrderProxy {
    pub(crate) fn new(g_cl_ord_id: GlobalOrderId, req: OrderReq, status: OrderStatusData) -> Self {
        Self {
            g_cl_ord_id,
            req: Arc::new(req),
            status: Arc::new(RwLock::new(status)),
        }
    }

    pub fn g_cl_ord_id(&self) -> &GlobalOrderId {
        &self.g_cl_ord_id
    }

    pub fn req(&self) -> &OrderReq {
        &self.req
    }

    pub fn symbol(&self) -> &str {
        &self.req.symbol
    }

    /// Copy of the latest snapshot
    pub fn status(&self) -> OrderStatusData {
        self.status.read().clone()
    }

    pub fn ord_status(&self) -> OrderStatus {
        self.status.read().ord_status
    }

    pub fn leaves_qty(&self) -> u64 {
        self.status.read().leaves_qty
    }

    pub fn is_open(&self) -> bool {
        self.status.read().is_open()
    }

    pub(crate) fn set_status(&self, status: OrderStatusData) {
        *self.status.write() = status;
    }

    /// True when both handles observe the same status cell
    pub fn same_order(&self, other: &OrderProxy) -> bool {
        Arc::ptr_eq(&self.status, &other.status)
    }
}

/// Open orders of one symbol, iterated in the order they were created
#[derive(Debug, Clone, Default)]
pub struct OpenOrders {
    by_seq: BTreeMap<u64, OrderProxy>,
    seq_of: HashMap<GlobalOrderId, u64>,
    next_seq: u64,
}

impl OpenOrders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the end; re-inserting an id keeps its original position
    pub(crate) fn insert(&mut self, proxy: OrderProxy) {
        match self.seq_of.get(proxy.g_cl_ord_id()) {
            Some(seq) => {
                self.by_seq.insert(*seq, proxy);
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.seq_of.insert(proxy.g_cl_ord_id().clone(), seq);
                self.by_seq.insert(seq, proxy);
            }
        }
    }

    pub(crate) fn remove(&mut self, g_cl_ord_id: &GlobalOrderId) -> Option<OrderProxy> {
        let seq = self.seq_of.remove(g_cl_ord_id)?;
        self.by_seq.remove(&seq)
    }

    pub fn get(&self, g_cl_ord_id: &GlobalOrderId) -> Option<&OrderProxy> {
        self.seq_of
            .get(g_cl_ord_id)
            .and_then(|seq| self.by_seq.get(seq))
    }

    pub fn contains(&self, g_cl_ord_id: &GlobalOrderId) -> bool {
        self.seq_of.contains_key(g_cl_ord_id)
    }

    pub fn len(&self) -> usize {
        self.by_seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_seq.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GlobalOrderId, &OrderProxy)> {
        self.by_seq.values().map(|p| (p.g_cl_ord_id(), p))
    }

    pub fn ids(&self) -> Vec<GlobalOrderId> {
        self.by_seq
            .values()
            .map(|p| p.g_cl_ord_id().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::testing::create_test_order;
    use relay_core::Side;
    use rust_decimal_macros::dec;
    use std::time::SystemTime;

    fn proxy(id: u64) -> OrderProxy {
        let req = create_test_order("000001", Side::Buy, 100, dec!(10)).with_cl_ord_id(id);
        let gid = GlobalOrderId::new("sim", "test", id);
        let status = OrderStatusData::generated(&req, gid.clone(), SystemTime::UNIX_EPOCH);
        OrderProxy::new(gid, req, status)
    }

    #[test]
    fn test_clones_share_status() {
        let a = proxy(1);
        let b = a.clone();
        let next = a.status().next(OrderStatus::PartTraded, 30, SystemTime::UNIX_EPOCH);
        a.set_status(next);

        assert_eq!(b.ord_status(), OrderStatus::PartTraded);
        assert_eq!(b.leaves_qty(), 30);
        assert!(a.same_order(&b));
        assert!(!a.same_order(&proxy(1)));
    }

    #[test]
    fn test_open_orders_keep_insertion_order() {
        let mut open = OpenOrders::new();
        for id in [5, 2, 9] {
            open.insert(proxy(id));
        }
        let order: Vec<_> = open.ids().iter().filter_map(|g| g.cl_ord_id()).collect();
        assert_eq!(order, vec![5, 2, 9]);

        assert!(open.remove(&GlobalOrderId::new("sim", "test", 2)).is_some());
        assert!(open.remove(&GlobalOrderId::new("sim", "test", 2)).is_none());
        open.insert(proxy(3));
        open.insert(proxy(5));

        let order: Vec<_> = open.iter().filter_map(|(g, _)| g.cl_ord_id()).collect();
        assert_eq!(order, vec![5, 9, 3]);
        assert_eq!(open.len(), 3);
    }
}
