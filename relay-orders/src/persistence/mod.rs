//! Persistence contract for orders, status snapshots and executions
//!
//! - `Dao<R>`: insert / find-by-identity / find-all for one record kind
//! - `Persistence`: typed access to the three DAOs
//! - `memory`: DashMap-backed store, the default for backtests
//! - `journal`: wraps a store and mirrors every insert to a JSON-lines file

pub mod journal;
pub mod memory;

pub use journal::{read_journal, replay_journal, JournalEntry, JournalRecord, JournalingPersistence};
pub use memory::{MemoryDao, MemoryPersistence};

use crate::error::PersistenceError;
use relay_core::{ClOrdId, ExecutionData, GlobalOrderId, OrderReq, OrderStatusData};
use std::time::SystemTime;

/// A record that can be stored by order identity
pub trait Record: Clone + Send + Sync + 'static {
    /// `gateway.account.clOrdID`, or `None` when the record has no client id
    fn key(&self) -> Option<GlobalOrderId>;

    /// Time the ledger is ordered by
    fn time(&self) -> SystemTime;

    fn symbol(&self) -> &str;
}

impl Record for OrderReq {
    fn key(&self) -> Option<GlobalOrderId> {
        self.g_cl_ord_id()
    }

    fn time(&self) -> SystemTime {
        self.transact_time
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Record for OrderStatusData {
    fn key(&self) -> Option<GlobalOrderId> {
        Some(self.g_cl_ord_id.clone())
    }

    fn time(&self) -> SystemTime {
        self.order_time
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl Record for ExecutionData {
    fn key(&self) -> Option<GlobalOrderId> {
        Some(self.g_cl_ord_id.clone())
    }

    fn time(&self) -> SystemTime {
        self.time
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Storage for one record kind
pub trait Dao<R>: Send + Sync {
    fn insert(&self, record: R) -> Result<(), PersistenceError>;

    /// Latest record for an order identity
    fn find(
        &self,
        gateway: &str,
        account: &str,
        cl_ord_id: ClOrdId,
    ) -> Result<Option<R>, PersistenceError>;

    /// Every record ever inserted, in insertion order
    fn find_all(&self) -> Result<Vec<R>, PersistenceError>;
}

pub trait Persistence: Send + Sync {
    fn orders(&self) -> &dyn Dao<OrderReq>;

    fn order_status(&self) -> &dyn Dao<OrderStatusData>;

    fn executions(&self) -> &dyn Dao<ExecutionData>;
}

/// Look up by a global id string; malformed ids find nothing
pub fn find_by_global_id<R>(
    dao: &dyn Dao<R>,
    g_cl_ord_id: &GlobalOrderId,
) -> Result<Option<R>, PersistenceError> {
    match g_cl_ord_id.parts() {
        Some((gateway, account, cl_ord_id)) => dao.find(gateway, account, cl_ord_id),
        None => Ok(None),
    }
}

/// Stable sort by record time
pub fn sorted_by_time<R: Record>(mut records: Vec<R>) -> Vec<R> {
    records.sort_by_key(|r| r.time());
    records
}
