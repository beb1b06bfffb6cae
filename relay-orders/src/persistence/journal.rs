//! Append-only JSON-lines journal for order records
//!
//! [`JournalingPersistence`] forwards every insert to an inner store and
//! hands a copy to a writer thread over a bounded channel, so handlers never
//! block on file I/O. When the channel is full the record is dropped from the
//! journal (never from the inner store) and counted.

use super::{Dao, Persistence, Record};
use crate::error::PersistenceError;
use crossbeam::channel::{bounded, Receiver, Sender};
use relay_core::config::JournalConfig;
use relay_core::{ClOrdId, ExecutionData, OrderReq, OrderStatusData};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};

/// Journaled record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "record", content = "data")]
pub enum JournalRecord {
    Order(OrderReq),
    OrderStatus(OrderStatusData),
    Execution(ExecutionData),
}

impl From<OrderReq> for JournalRecord {
    fn from(r: OrderReq) -> Self {
        JournalRecord::Order(r)
    }
}

impl From<OrderStatusData> for JournalRecord {
    fn from(r: OrderStatusData) -> Self {
        JournalRecord::OrderStatus(r)
    }
}

impl From<ExecutionData> for JournalRecord {
    fn from(r: ExecutionData) -> Self {
        JournalRecord::Execution(r)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    /// Wall-clock write time, milliseconds since the epoch
    pub timestamp: u64,
    #[serde(flatten)]
    pub record: JournalRecord,
}

impl JournalEntry {
    pub fn new(record: JournalRecord) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_millis() as u64;

        Self { timestamp, record }
    }
}

/// Background writer
struct OrderJournal {
    sender: Option<Sender<JournalRecord>>,
    thread_handle: Option<thread::JoinHandle<()>>,
    dropped: AtomicU64,
}

impl OrderJournal {
    fn open(path: &Path, buffer_size: usize) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let (sender, receiver) = bounded(buffer_size);
        let handle = thread::Builder::new()
            .name("relay-journal".to_string())
            .spawn(move || Self::writer_loop(file, receiver))?;

        info!(path = ?path, buffer_size, "Order journal opened");
        Ok(Self {
            sender: Some(sender),
            thread_handle: Some(handle),
            dropped: AtomicU64::new(0),
        })
    }

    fn writer_loop(file: File, receiver: Receiver<JournalRecord>) {
        let mut writer = BufWriter::new(file);

        for record in receiver.iter() {
            let entry = JournalEntry::new(record);
            match serde_json::to_string(&entry) {
                Ok(json) => {
                    if let Err(e) = writeln!(writer, "{}", json) {
                        error!("Failed to write to journal: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize journal entry: {}", e);
                }
            }

            // Flush whenever we catch up with the producers
            if receiver.is_empty() {
                if let Err(e) = writer.flush() {
                    error!("Failed to flush journal: {}", e);
                }
            }
        }

        if let Err(e) = writer.flush() {
            error!("Failed to flush journal: {}", e);
        }
        info!("Order journal writer stopping");
    }

    fn record(&self, record: JournalRecord) {
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.try_send(record) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Order journal full or closed, dropping record: {}", e);
            }
        }
    }
}

impl Drop for OrderJournal {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop
        let _ = self.sender.take();

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Records the journal knows how to pick out of a [`Persistence`]
pub trait Journaled: Record + Into<JournalRecord> {
    fn dao_of(persistence: &dyn Persistence) -> &dyn Dao<Self>;
}

impl Journaled for OrderReq {
    fn dao_of(persistence: &dyn Persistence) -> &dyn Dao<Self> {
        persistence.orders()
    }
}

impl Journaled for OrderStatusData {
    fn dao_of(persistence: &dyn Persistence) -> &dyn Dao<Self> {
        persistence.order_status()
    }
}

impl Journaled for ExecutionData {
    fn dao_of(persistence: &dyn Persistence) -> &dyn Dao<Self> {
        persistence.executions()
    }
}

struct JournaledDao<R> {
    inner: Arc<dyn Persistence>,
    journal: Arc<OrderJournal>,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R: Journaled> Dao<R> for JournaledDao<R> {
    fn insert(&self, record: R) -> Result<(), PersistenceError> {
        R::dao_of(self.inner.as_ref()).insert(record.clone())?;
        self.journal.record(record.into());
        Ok(())
    }

    fn find(
        &self,
        gateway: &str,
        account: &str,
        cl_ord_id: ClOrdId,
    ) -> Result<Option<R>, PersistenceError> {
        R::dao_of(self.inner.as_ref()).find(gateway, account, cl_ord_id)
    }

    fn find_all(&self) -> Result<Vec<R>, PersistenceError> {
        R::dao_of(self.inner.as_ref()).find_all()
    }
}

/// Persistence that mirrors every insert onto a journal file
pub struct JournalingPersistence {
    orders: JournaledDao<OrderReq>,
    order_status: JournaledDao<OrderStatusData>,
    executions: JournaledDao<ExecutionData>,
    journal: Arc<OrderJournal>,
}

impl JournalingPersistence {
    pub fn open(
        inner: Arc<dyn Persistence>,
        path: impl AsRef<Path>,
        buffer_size: usize,
    ) -> Result<Self, PersistenceError> {
        if buffer_size == 0 {
            return Err(PersistenceError::Unavailable(
                "journal buffer size must be positive".to_string(),
            ));
        }
        let journal = Arc::new(OrderJournal::open(path.as_ref(), buffer_size)?);

        Ok(Self {
            orders: Self::dao(&inner, &journal),
            order_status: Self::dao(&inner, &journal),
            executions: Self::dao(&inner, &journal),
            journal,
        })
    }

    pub fn from_config(
        inner: Arc<dyn Persistence>,
        config: &JournalConfig,
    ) -> Result<Self, PersistenceError> {
        Self::open(inner, &config.path, config.buffer_size)
    }

    fn dao<R>(inner: &Arc<dyn Persistence>, journal: &Arc<OrderJournal>) -> JournaledDao<R> {
        JournaledDao {
            inner: Arc::clone(inner),
            journal: Arc::clone(journal),
            _record: std::marker::PhantomData,
        }
    }

    /// Records that did not make it into the journal
    pub fn dropped(&self) -> u64 {
        self.journal.dropped.load(Ordering::Relaxed)
    }
}

impl Persistence for JournalingPersistence {
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

/// Read every entry of a journal file
pub fn read_journal(path: impl AsRef<Path>) -> Result<Vec<JournalEntry>, PersistenceError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

/// Rebuild a store from a journal; returns the number of records replayed
pub fn replay_journal(
    path: impl AsRef<Path>,
    target: &dyn Persistence,
) -> Result<usize, PersistenceError> {
    let entries = read_journal(path)?;
    for entry in &entries {
        match &entry.record {
            JournalRecord::Order(r) => target.orders().insert(r.clone())?,
            JournalRecord::OrderStatus(r) => target.order_status().insert(r.clone())?,
            JournalRecord::Execution(r) => target.executions().insert(r.clone())?,
        }
    }
    info!(records = entries.len(), "Journal replayed");
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryPersistence;
    use relay_core::testing::create_test_order;
    use relay_core::{OrderStatus, Side};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    #[test]
    fn test_journal_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.jsonl");
        let req = create_test_order("000001", Side::Buy, 100, dec!(10.25)).with_cl_ord_id(1);
        let gid = req.g_cl_ord_id().unwrap();
        let status = OrderStatusData::generated(&req, gid, SystemTime::UNIX_EPOCH);

        // Scope the journal so it drops and flushes
        {
            let inner: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
            let persistence = JournalingPersistence::open(Arc::clone(&inner), &path, 16).unwrap();
            persistence.orders().insert(req.clone()).unwrap();
            persistence.order_status().insert(status.clone()).unwrap();

            // Reads go to the inner store
            assert_eq!(persistence.orders().find("sim", "test", 1).unwrap(), Some(req.clone()));
            assert_eq!(inner.order_status().find_all().unwrap().len(), 1);
            assert_eq!(persistence.dropped(), 0);
        }

        let entries = read_journal(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].record, JournalRecord::Order(req));
        assert_eq!(entries[1].record, JournalRecord::OrderStatus(status));

        let recovered = MemoryPersistence::new();
        assert_eq!(replay_journal(&path, &recovered).unwrap(), 2);
        let found = recovered.order_status().find("sim", "test", 1).unwrap().unwrap();
        assert_eq!(found.ord_status, OrderStatus::Generate);
    }

    #[test]
    fn test_failed_insert_is_not_journaled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("orders.jsonl");

        {
            let inner: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
            let persistence = JournalingPersistence::open(inner, &path, 16).unwrap();
            let no_id = create_test_order("000001", Side::Buy, 100, dec!(10));
            assert!(persistence.orders().insert(no_id).is_err());
        }

        assert!(read_journal(&path).unwrap().is_empty());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let dir = TempDir::new().unwrap();
        let inner: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
        let result = JournalingPersistence::open(inner, dir.path().join("j.jsonl"), 0);
        assert!(matches!(result, Err(PersistenceError::Unavailable(_))));
    }
}
