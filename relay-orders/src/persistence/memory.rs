use super::{Dao, Persistence, Record};
use crate::error::PersistenceError;
use dashmap::DashMap;
use parking_lot::Mutex;
use relay_core::{ClOrdId, ExecutionData, GlobalOrderId, OrderReq, OrderStatusData};

/// Latest record per order plus the full insertion history
pub struct MemoryDao<R> {
    latest: DashMap<GlobalOrderId, R>,
    history: Mutex<Vec<R>>,
}

impl<R: Record> MemoryDao<R> {
    pub fn new() -> Self {
        Self {
            latest: DashMap::new(),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }
}

impl<R: Record> Default for MemoryDao<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Dao<R> for MemoryDao<R> {
    fn insert(&self, record: R) -> Result<(), PersistenceError> {
        let key = record.key().ok_or_else(|| PersistenceError::MissingKey {
            symbol: record.symbol().to_string(),
        })?;

        // History first so find_all never misses a record find() can see
        self.history.lock().push(record.clone());
        self.latest.insert(key, record);
        Ok(())
    }

    fn find(
        &self,
        gateway: &str,
        account: &str,
        cl_ord_id: ClOrdId,
    ) -> Result<Option<R>, PersistenceError> {
        let key = GlobalOrderId::new(gateway, account, cl_ord_id);
        Ok(self.latest.get(&key).map(|r| r.value().clone()))
    }

    fn find_all(&self) -> Result<Vec<R>, PersistenceError> {
        Ok(self.history.lock().clone())
    }
}

/// In-memory persistence for backtests and tests
#[derive(Default)]
pub struct MemoryPersistence {
    orders: MemoryDao<OrderReq>,
    order_status: MemoryDao<OrderStatusData>,
    executions: MemoryDao<ExecutionData>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MemoryPersistence {
    fn orders(&self) -> &dyn Dao<OrderReq> {
        &self.orders
    }

    fn order_status(&self) -> &dyn Dao<OrderStatusData> {
        &self.order_status
    }

    fn executions(&self) -> &dyn Dao<ExecutionData> {
        &self.executions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::testing::create_test_order;
    use relay_core::{OrderStatus, Side};
    use rust_decimal_macros::dec;
    use std::time::SystemTime;

    #[test]
    fn test_find_returns_latest_snapshot() {
        let dao: MemoryDao<OrderStatusData> = MemoryDao::new();
        let req = create_test_order("000001", Side::Buy, 100, dec!(10)).with_cl_ord_id(1);
        let gid = req.g_cl_ord_id().unwrap();

        let first = OrderStatusData::generated(&req, gid.clone(), SystemTime::UNIX_EPOCH);
        let second = first.next(OrderStatus::PartTraded, 40, SystemTime::UNIX_EPOCH);
        dao.insert(first).unwrap();
        dao.insert(second).unwrap();

        let found = dao.find("sim", "test", 1).unwrap().unwrap();
        assert_eq!(found.ord_status, OrderStatus::PartTraded);
        assert_eq!(found.leaves_qty, 40);
        assert_eq!(dao.find_all().unwrap().len(), 2);
        assert!(dao.find("sim", "test", 2).unwrap().is_none());
    }

    #[test]
    fn test_insert_without_client_id_fails() {
        let dao: MemoryDao<OrderReq> = MemoryDao::new();
        let req = create_test_order("000001", Side::Buy, 100, dec!(10));
        assert!(matches!(
            dao.insert(req),
            Err(PersistenceError::MissingKey { .. })
        ));
        assert!(dao.is_empty());
    }

    #[test]
    fn test_persistence_accessors() {
        let persistence = MemoryPersistence::new();
        let req = create_test_order("000001", Side::Sell, 5, dec!(3)).with_cl_ord_id(9);
        persistence.orders().insert(req.clone()).unwrap();

        assert_eq!(persistence.orders().find("sim", "test", 9).unwrap(), Some(req));
        assert!(persistence.executions().find_all().unwrap().is_empty());
    }
}
